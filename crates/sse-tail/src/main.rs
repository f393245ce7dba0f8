use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, bail};
use sse_client::{ClientSettings, FileStore, SseManager, TcpProbeMonitor};
use sse_core::RequestConfig;
use sse_tail::cli::args::{Args, parse_args, print_help};
use sse_tail::config::paths::{self, APP_NAME, VERSION};
use sse_tail::output::render_batch;
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    if let Some(first) = args.errors.first() {
        bail!("{first}");
    }
    let Some(url) = args.url.as_deref() else {
        bail!("Missing feed URL (see --help)");
    };

    let state_dir = paths::resolve_state_dir(args.state_dir.as_deref().map(Path::new));
    paths::ensure_dir(&state_dir)
        .with_context(|| format!("Failed to create state directory {}", state_dir.display()))?;

    let settings_path = paths::settings_file(&state_dir);
    let mut settings = ClientSettings::load(&settings_path)
        .with_context(|| format!("Failed to load {}", settings_path.display()))?;
    if let Some(ms) = args.retry_delay_ms {
        settings.retry_delay_ms = ms;
    }
    if let Some(strategy) = args.strategy {
        settings.strategy = strategy;
    }

    let store = FileStore::open(&paths::last_event_ids_file(&state_dir))
        .context("Failed to open last event id store")?;
    let manager = SseManager::from_settings(&settings, Arc::new(store))?;

    let mut request = settings.apply(RequestConfig::new(url)?)?;
    for (key, value) in &args.headers {
        request = request.with_header(key, value)?;
    }

    if let Some(probe) = &args.probe {
        manager.start_monitor(Arc::new(
            TcpProbeMonitor::new(probe.clone())
                .timeout(settings.probe_timeout())
                .interval(settings.probe_interval()),
        ));
    }
    if let Some(id) = manager.last_event_id(&request) {
        tracing::info!(id, "Resuming feed");
    }

    let mut stream = manager.open(&request);
    let terminate = stream.terminate_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupted, closing feed");
            terminate.terminate();
        }
    });

    while let Some(batch) = stream.next_batch().await {
        for line in render_batch(&batch, args.mode)? {
            println!("{line}");
        }
    }

    manager.stop_monitor();
    Ok(())
}

#[tokio::main]
async fn main() {
    let raw_args = std::env::args().skip(1).collect::<Vec<_>>();
    let args = parse_args(&raw_args);

    if args.help {
        print_help(APP_NAME);
        return;
    }
    if args.version {
        println!("{VERSION}");
        return;
    }

    init_logging(args.verbose);

    if let Err(e) = run(args).await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
