//! Runtime-free building blocks for consuming a server-sent event feed:
//! the request model, the event model and the wire decoder.

pub mod error;
pub mod headers;
pub mod parser;
pub mod request;
pub mod types;

pub use error::ConfigError;
pub use parser::parse;
pub use request::{DEFAULT_RETRY_DELAY, RequestConfig, SseStrategy};
pub use types::{EventBatch, SseData, SseEvent, has_data, last_event_id, values};
