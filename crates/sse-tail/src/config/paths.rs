use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;

pub const APP_NAME: &str = "sse-tail";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const STATE_DIR_NAME: &str = ".sse-tail";

pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const LAST_EVENT_IDS_FILE_NAME: &str = "last_event_ids.json";

/// Default state directory: ~/.sse-tail/
pub static DEFAULT_STATE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STATE_DIR_NAME)
});

/// Resolve the state directory, using the provided override or the default.
pub fn resolve_state_dir(override_dir: Option<&Path>) -> PathBuf {
    override_dir
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| DEFAULT_STATE_DIR.clone())
}

pub fn settings_file(base: &Path) -> PathBuf {
    base.join(SETTINGS_FILE_NAME)
}

/// Persisted resume positions, one per feed.
pub fn last_event_ids_file(base: &Path) -> PathBuf {
    base.join(LAST_EVENT_IDS_FILE_NAME)
}

/// Ensure a directory exists, creating it if needed.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
