use std::collections::HashMap;

pub const ACCEPT: &str = "Accept";
pub const CACHE_CONTROL: &str = "Cache-Control";
pub const LAST_EVENT_ID: &str = "Last-Event-Id";

pub const TEXT_EVENT_STREAM: &str = "text/event-stream";
pub const NO_CACHE: &str = "no-cache";

/// Find the key already present in `headers` that matches `key` ignoring case.
fn existing_key(headers: &HashMap<String, String>, key: &str) -> Option<String> {
    headers
        .keys()
        .find(|existing| existing.eq_ignore_ascii_case(key))
        .cloned()
}

/// Set a header, replacing any existing entry whose name differs only in case.
pub fn set_header(headers: &mut HashMap<String, String>, key: &str, value: &str) {
    if let Some(existing) = existing_key(headers, key) {
        headers.remove(&existing);
    }
    headers.insert(key.to_string(), value.to_string());
}

/// Case-insensitive header lookup.
pub fn get_header<'a>(headers: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(existing, _)| existing.eq_ignore_ascii_case(key))
        .map(|(_, value)| value.as_str())
}

/// Merge `source` into `target`; entries in `source` win.
pub fn merge_headers(target: &mut HashMap<String, String>, source: &HashMap<String, String>) {
    for (k, v) in source {
        set_header(target, k, v);
    }
}

/// Header names and values must be visible ASCII without line breaks.
pub fn is_valid_header(key: &str, value: &str) -> bool {
    !key.is_empty()
        && key.bytes().all(|b| b.is_ascii_graphic() && b != b':')
        && value.bytes().all(|b| b == b'\t' || (b' '..=b'~').contains(&b))
}
