pub mod connection;
pub mod error;
pub mod gate;
pub mod http;
pub mod manager;
pub mod reachability;
pub mod reconnect;
pub mod settings;
pub mod state;
pub mod store;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// ========== Public API re-exports ==========

// Errors
pub use error::{SseError, TransportError};

// Manager
pub use manager::{FeedStream, SseManager, TerminateHandle};
pub use settings::ClientSettings;
pub use state::SessionState;

// Collaborators
pub use http::ReqwestTransport;
pub use reachability::{ConnectivityMonitor, ConnectivityStatus, Reachability, TcpProbeMonitor};
pub use store::{FileStore, KeyValueStore, LastEventIdStore, MemoryStore};
pub use transport::{Completion, SseTransport, TransportEvent, TransportStream};

// Pipeline stages
pub use connection::Connection;
pub use gate::ReachabilityGate;
pub use reconnect::{EventSink, ReconnectPolicy, RetryExit};

pub use sse_core::{EventBatch, RequestConfig, SseData, SseEvent, SseStrategy};
