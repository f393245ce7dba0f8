//! Rendering of delivered batches.

use sse_core::{SseData, SseEvent};

use crate::cli::args::OutputMode;

/// Lines to print for one batch. `Dummy` events produce nothing in text
/// mode; JSON mode prints every event, one object per line.
pub fn render_batch(
    batch: &[SseEvent<SseData>],
    mode: OutputMode,
) -> Result<Vec<String>, serde_json::Error> {
    match mode {
        OutputMode::Json => batch.iter().map(serde_json::to_string).collect(),
        OutputMode::Text => Ok(batch.iter().filter_map(render_text).collect()),
    }
}

fn render_text(event: &SseEvent<SseData>) -> Option<String> {
    match event {
        SseEvent::ConnectionOpened => Some("-- connected".to_string()),
        SseEvent::Dummy => None,
        SseEvent::DataReceived(data) => {
            let name = data.event.as_deref().unwrap_or("message");
            let head = match data.id.as_deref() {
                Some(id) => format!("{name} #{id}"),
                None => name.to_string(),
            };
            Some(format!("{head}: {}", data.data.as_deref().unwrap_or("")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> Vec<SseEvent<SseData>> {
        vec![
            SseEvent::ConnectionOpened,
            SseEvent::DataReceived(SseData::new(
                Some("7".into()),
                Some("update".into()),
                Some("hello".into()),
            )),
            SseEvent::Dummy,
            SseEvent::DataReceived(SseData::new(None, None, Some("a\nb".into()))),
        ]
    }

    #[test]
    fn test_text_lines() {
        let lines = render_batch(&batch(), OutputMode::Text).unwrap();
        assert_eq!(lines, vec!["-- connected", "update #7: hello", "message: a\nb"]);
    }

    #[test]
    fn test_json_lines() {
        let lines = render_batch(&batch(), OutputMode::Json).unwrap();
        assert_eq!(lines.len(), 4);
        let data: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
        assert_eq!(data["type"], "data_received");
        assert_eq!(data["value"]["id"], "7");
        assert_eq!(data["value"]["data"], "hello");
        assert_eq!(lines[2], r#"{"type":"dummy"}"#);
    }
}
