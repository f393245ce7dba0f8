use std::fmt;

use serde::{Deserialize, Serialize};

// ---------- SseEvent ----------

/// Event delivered by a server-sent event feed.
///
/// Only `DataReceived` carries a value. `Dummy` stands in for wire
/// constructs that are recognized but not acted upon (e.g. `retry:`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SseEvent<T> {
    ConnectionOpened,
    DataReceived(T),
    Dummy,
}

impl<T> SseEvent<T> {
    /// The carried value, if any.
    pub fn value(&self) -> Option<&T> {
        match self {
            SseEvent::DataReceived(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_data(&self) -> bool {
        matches!(self, SseEvent::DataReceived(_))
    }

    /// Map the carried value, keeping the variant.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SseEvent<U> {
        match self {
            SseEvent::ConnectionOpened => SseEvent::ConnectionOpened,
            SseEvent::DataReceived(value) => SseEvent::DataReceived(f(value)),
            SseEvent::Dummy => SseEvent::Dummy,
        }
    }
}

// ---------- SseData ----------

/// One decoded event block. All fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SseData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl SseData {
    pub fn new(id: Option<String>, event: Option<String>, data: Option<String>) -> Self {
        Self { id, event, data }
    }
}

impl fmt::Display for SseData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id: {:?}, event: {:?}, data: {:?}",
            self.id, self.event, self.data
        )
    }
}

/// A batch is everything decoded from one transport chunk.
pub type EventBatch = Vec<SseEvent<SseData>>;

// ---------- Batch helpers ----------

/// All carried values of a batch, in order.
pub fn values<'a, T: 'a>(events: impl IntoIterator<Item = &'a SseEvent<T>>) -> Vec<&'a T> {
    events.into_iter().filter_map(SseEvent::value).collect()
}

/// Whether any event in the batch carries a value.
pub fn has_data<'a, T: 'a>(events: impl IntoIterator<Item = &'a SseEvent<T>>) -> bool {
    events.into_iter().any(SseEvent::is_data)
}

/// The id of the last `DataReceived` event that has one.
pub fn last_event_id<'a>(events: impl IntoIterator<Item = &'a SseEvent<SseData>>) -> Option<&'a str> {
    events
        .into_iter()
        .filter_map(SseEvent::value)
        .filter_map(|data| data.id.as_deref())
        .last()
}
