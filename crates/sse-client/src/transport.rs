//! Streaming HTTP transport seen by a [`Connection`](crate::connection::Connection).

use std::pin::Pin;

use bytes::Bytes;
use futures::Stream;
use sse_core::RequestConfig;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;

/// How a transport session ended.
#[derive(Debug)]
pub enum Completion {
    /// The session's cancellation token fired. Must not be reported for any
    /// other reason.
    Cancelled,
    /// The server closed the response without an error.
    Finished,
    Failed(TransportError),
}

/// Callbacks of one transport session, in the order they happened.
#[derive(Debug)]
pub enum TransportEvent {
    ResponseReceived { status: u16 },
    Chunk(Bytes),
    Completed(Completion),
}

pub type TransportStream = Pin<Box<dyn Stream<Item = TransportEvent> + Send>>;

/// Issues a streaming GET with the request's headers.
///
/// Implementations start the session immediately and must stop producing
/// events once `cancel` fires, reporting [`Completion::Cancelled`] or simply
/// ending the stream.
pub trait SseTransport: Send + Sync {
    fn connect(&self, request: &RequestConfig, cancel: CancellationToken) -> TransportStream;
}
