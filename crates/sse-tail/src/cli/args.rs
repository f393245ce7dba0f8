use sse_core::SseStrategy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default)]
pub struct Args {
    pub url: Option<String>,
    pub headers: Vec<(String, String)>,
    pub retry_delay_ms: Option<u64>,
    pub strategy: Option<SseStrategy>,
    pub probe: Option<String>,
    pub state_dir: Option<String>,
    pub mode: OutputMode,
    pub verbose: bool,
    pub help: bool,
    pub version: bool,
    /// Problems found while parsing, reported before anything runs.
    pub errors: Vec<String>,
}

/// Split `Name: value` (or `Name:value`) into a header pair.
pub fn parse_header(raw: &str) -> Option<(String, String)> {
    let (key, value) = raw.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    Some((key.to_string(), value.trim().to_string()))
}

pub fn parse_strategy(raw: &str) -> Option<SseStrategy> {
    match raw {
        "error" | "retryOnError" => Some(SseStrategy::RetryOnError),
        "connectivity" | "retryOnConnectivity" => Some(SseStrategy::RetryOnConnectivity),
        _ => None,
    }
}

pub fn parse_args(args: &[String]) -> Args {
    let mut result = Args::default();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => result.help = true,
            "--version" | "-v" => result.version = true,
            "--json" => result.mode = OutputMode::Json,
            "--verbose" => result.verbose = true,
            "--header" | "-H" if i + 1 < args.len() => {
                i += 1;
                match parse_header(&args[i]) {
                    Some(header) => result.headers.push(header),
                    None => result
                        .errors
                        .push(format!("Invalid header '{}', expected Name:value", args[i])),
                }
            }
            "--retry-delay" if i + 1 < args.len() => {
                i += 1;
                match args[i].parse::<u64>() {
                    Ok(ms) => result.retry_delay_ms = Some(ms),
                    Err(_) => result
                        .errors
                        .push(format!("Invalid --retry-delay '{}', expected milliseconds", args[i])),
                }
            }
            "--strategy" if i + 1 < args.len() => {
                i += 1;
                match parse_strategy(&args[i]) {
                    Some(strategy) => result.strategy = Some(strategy),
                    None => result.errors.push(format!(
                        "Unknown strategy '{}', expected error or connectivity",
                        args[i]
                    )),
                }
            }
            "--probe" if i + 1 < args.len() => {
                i += 1;
                result.probe = Some(args[i].clone());
            }
            "--state-dir" if i + 1 < args.len() => {
                i += 1;
                result.state_dir = Some(args[i].clone());
            }
            v if v.starts_with('-') => {
                result.errors.push(format!("Unknown or incomplete option '{v}'"));
            }
            v if result.url.is_none() => result.url = Some(v.to_string()),
            v => result.errors.push(format!("Unexpected argument '{v}'")),
        }

        i += 1;
    }

    result
}

pub fn print_help(bin_name: &str) {
    println!(
        "{bin_name} - follow a server-sent event feed\n\n\
         Usage:\n  {bin_name} [options] <url>\n\n\
         Options:\n  --header, -H <Name:value>   (repeatable)\n  --retry-delay <ms>\n  --strategy <error|connectivity>\n  --probe <host:port>\n  --state-dir <dir>\n  --json\n  --verbose\n  --help, -h\n  --version, -v"
    );
}
