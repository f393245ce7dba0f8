//! Server-Sent Events wire decoder.
//!
//! Turns one raw chunk into the events it contains. Blocks are separated by
//! a doubled newline (`\r\n\r\n`, `\n\n` or `\r\r`); each block is a set of
//! `field: value` lines. Decoding is stateless: bytes after the last
//! boundary are dropped, never carried into the next chunk.

use std::collections::HashMap;

use crate::types::{SseData, SseEvent};

/// Event boundaries, in the order they are tried at each position.
const BOUNDARIES: [&[u8]; 3] = [b"\r\n\r\n", b"\n\n", b"\r\r"];

const COMMENT_PREFIX: char = ':';
const RETRY_FIELD: &str = "retry:";

/// Decode every complete event block in `bytes`.
///
/// Never fails: undecodable blocks and unparseable lines are skipped.
pub fn parse(bytes: &[u8]) -> Vec<SseEvent<SseData>> {
    split_blocks(bytes).into_iter().filter_map(parse_block).collect()
}

/// Locate the first boundary at or after `from`, returning its byte range.
fn next_boundary(bytes: &[u8], from: usize) -> Option<(usize, usize)> {
    (from..bytes.len()).find_map(|pos| {
        BOUNDARIES
            .iter()
            .find(|boundary| bytes[pos..].starts_with(boundary))
            .map(|boundary| (pos, pos + boundary.len()))
    })
}

/// Raw, non-empty segments between boundaries.
pub fn split_blocks(bytes: &[u8]) -> Vec<&[u8]> {
    let mut blocks = Vec::new();
    let mut start = 0;

    while let Some((lo, hi)) = next_boundary(bytes, start) {
        if lo > start {
            blocks.push(&bytes[start..lo]);
        }
        start = hi;
    }

    if start < bytes.len() {
        tracing::debug!(
            trailing = bytes.len() - start,
            "Dropping bytes after the last event boundary"
        );
    }

    blocks
}

/// Decode a single block. Returns `None` for empty, comment and
/// undecodable blocks.
pub fn parse_block(raw: &[u8]) -> Option<SseEvent<SseData>> {
    let text = match std::str::from_utf8(raw) {
        Ok(text) => text,
        Err(e) => {
            tracing::debug!("Skipping event block that is not UTF-8: {e}");
            return None;
        }
    };

    if text.is_empty() || text.starts_with(COMMENT_PREFIX) {
        return None;
    }

    if let Some(retry) = retry_directive(text) {
        // Recognized but not applied; the reconnect delay comes from the request.
        tracing::debug!(retry, "Ignoring retry directive");
        return Some(SseEvent::Dummy);
    }

    let mut fields = parse_fields(text);
    Some(SseEvent::DataReceived(SseData {
        id: fields.remove("id"),
        event: fields.remove("event"),
        data: fields.remove("data"),
    }))
}

fn lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(['\r', '\n']).filter(|line| !line.is_empty())
}

fn retry_directive(text: &str) -> Option<&str> {
    lines(text).find_map(|line| line.strip_prefix(RETRY_FIELD).map(str::trim))
}

/// Collect every field of a block. Repeated keys are joined with `\n` in
/// the order they appear; a line without a colon is a key with an empty
/// value. Lines with an empty key (including `:` comments) are skipped.
pub fn parse_fields(text: &str) -> HashMap<String, String> {
    let mut fields: HashMap<String, String> = HashMap::new();

    for line in lines(text) {
        let (key, value) = match line.split_once(':') {
            Some((key, value)) => (key.trim(), value.trim()),
            None => (line.trim(), ""),
        };
        if key.is_empty() {
            continue;
        }

        fields
            .entry(key.to_string())
            .and_modify(|existing| {
                existing.push('\n');
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }

    fields
}
