//! Last-event-id persistence.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use sse_core::{RequestConfig, SseData, SseEvent};

use crate::error::SseError;

/// String key-value storage. Writes are last-write-wins per key.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<(), SseError>;
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SseError> {
        self.values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Store backed by a JSON object file.
///
/// The file is read once, then served from memory; every write rewrites it
/// atomically (temp file + rename). On Unix the file is owner-only (0600).
pub struct FileStore {
    path: PathBuf,
    cache: RwLock<HashMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self, SseError> {
        let cache = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            if content.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&content)?
            }
        } else {
            HashMap::new()
        };
        Ok(Self {
            path: path.to_path_buf(),
            cache: RwLock::new(cache),
        })
    }

    fn persist(&self, values: &HashMap<String, String>) -> Result<(), SseError> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let content = serde_json::to_string_pretty(values)?;

        let unique = uuid::Uuid::new_v4();
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "store".to_string());
        let tmp_path = self.path.with_file_name(format!(".{file_name}.{unique}.tmp"));

        {
            use std::io::Write;

            let mut options = std::fs::OpenOptions::new();
            options.write(true).create_new(true);
            #[cfg(unix)]
            {
                use std::os::unix::fs::OpenOptionsExt;
                options.mode(0o600);
            }
            let mut file = options.open(&tmp_path).map_err(|e| {
                SseError::Store(format!(
                    "Failed to create temp store file {}: {e}",
                    tmp_path.display()
                ))
            })?;

            file.write_all(content.as_bytes()).map_err(|e| {
                let _ = std::fs::remove_file(&tmp_path);
                SseError::Io(e)
            })?;
        }

        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            SseError::Io(e)
        })?;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.cache.read().unwrap_or_else(PoisonError::into_inner).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SseError> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if cache.get(key).map(String::as_str) == Some(value) {
            return Ok(());
        }
        // The cache only moves once the file has.
        let mut next = cache.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *cache = next;
        Ok(())
    }
}

/// Last event id per feed, keyed by the feed's URL identity.
#[derive(Clone)]
pub struct LastEventIdStore {
    store: Arc<dyn KeyValueStore>,
}

impl LastEventIdStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn get(&self, request: &RequestConfig) -> Option<String> {
        self.store.get(&request.last_event_id_key())
    }

    pub fn set(&self, request: &RequestConfig, id: &str) -> Result<(), SseError> {
        self.store.set(&request.last_event_id_key(), id)
    }

    /// Persist the last id carried by `batch`. Batches without any id leave
    /// the stored value alone. Returns the id that was stored.
    pub fn record_batch<'a>(
        &self,
        request: &RequestConfig,
        batch: &'a [SseEvent<SseData>],
    ) -> Result<Option<&'a str>, SseError> {
        match sse_core::last_event_id(batch) {
            Some(id) => {
                self.set(request, id)?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    /// `request` with protocol headers and the currently stored id.
    pub fn request_with_default_params(&self, request: &RequestConfig) -> RequestConfig {
        request.with_default_params(self.get(request).as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> RequestConfig {
        RequestConfig::new(url).unwrap()
    }

    fn with_id(id: Option<&str>) -> SseEvent<SseData> {
        SseEvent::DataReceived(SseData {
            id: id.map(str::to_string),
            event: None,
            data: Some("payload".to_string()),
        })
    }

    #[test]
    fn test_memory_store_roundtrip() {
        let store = MemoryStore::new();
        assert_eq!(store.get("k"), None);
        store.set("k", "v1").unwrap();
        store.set("k", "v2").unwrap();
        assert_eq!(store.get("k").as_deref(), Some("v2"));
    }

    #[test]
    fn test_record_batch_keeps_last_non_nil_id() {
        let ids = LastEventIdStore::new(Arc::new(MemoryStore::new()));
        let feed = request("https://example.com/feed");

        let batch = vec![with_id(Some("5")), with_id(Some("7")), SseEvent::Dummy];
        assert_eq!(ids.record_batch(&feed, &batch).unwrap(), Some("7"));
        assert_eq!(ids.get(&feed).as_deref(), Some("7"));

        let no_ids = vec![SseEvent::Dummy, with_id(None), SseEvent::ConnectionOpened];
        assert_eq!(ids.record_batch(&feed, &no_ids).unwrap(), None);
        assert_eq!(ids.get(&feed).as_deref(), Some("7"));
    }

    #[test]
    fn test_keys_follow_url_identity() {
        let ids = LastEventIdStore::new(Arc::new(MemoryStore::new()));
        ids.set(&request("https://example.com/feed?a=1"), "1").unwrap();

        // Query strings do not change the identity; paths and ports do.
        assert_eq!(ids.get(&request("https://example.com/feed?b=2")).as_deref(), Some("1"));
        assert_eq!(ids.get(&request("https://example.com/other")), None);
        assert_eq!(ids.get(&request("https://example.com:8443/feed")), None);
    }

    #[test]
    fn test_request_with_default_params_uses_stored_id() {
        let ids = LastEventIdStore::new(Arc::new(MemoryStore::new()));
        let feed = request("https://example.com/feed");
        assert_eq!(ids.request_with_default_params(&feed).header("Last-Event-Id"), None);

        ids.set(&feed, "99").unwrap();
        let derived = ids.request_with_default_params(&feed);
        assert_eq!(derived.header("Last-Event-Id"), Some("99"));
        assert_eq!(derived.header("Accept"), Some("text/event-stream"));
    }

    #[test]
    fn test_file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("last_event_ids.json");

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("k"), None);
        store.set("k", "42").unwrap();
        assert!(path.exists());

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("k").as_deref(), Some("42"));
    }

    #[test]
    fn test_file_store_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(FileStore::open(&path), Err(SseError::Json(_))));
    }

    #[test]
    fn test_failed_write_leaves_cache_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("state");
        std::fs::write(&blocker, "").unwrap();
        let path = blocker.join("ids.json");

        let store = FileStore::open(&path).unwrap();
        assert!(matches!(store.set("k", "1"), Err(SseError::Store(_))));
        assert_eq!(store.get("k"), None);

        std::fs::remove_file(&blocker).unwrap();
        std::fs::create_dir(&blocker).unwrap();
        store.set("k", "1").unwrap();
        assert_eq!(FileStore::open(&path).unwrap().get("k").as_deref(), Some("1"));
    }

    #[cfg(unix)]
    #[test]
    fn test_file_store_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ids.json");
        FileStore::open(&path).unwrap().set("k", "v").unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
