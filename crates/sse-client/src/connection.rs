//! One connection attempt: transport callbacks translated into typed events.

use bytes::Bytes;
use futures::StreamExt;
use sse_core::{RequestConfig, SseEvent};
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::transport::{Completion, SseTransport, TransportEvent, TransportStream};

/// Chunks of this size or smaller carry no protocol content. Some transports
/// deliver a one-byte priming chunk right after the response arrives.
pub const PRIMING_CHUNK_LEN: usize = 1;

/// A live transport session.
///
/// Yields `ConnectionOpened` once the response arrives, then
/// `DataReceived(chunk)` per body chunk. Ends with `Some(Err(_))` for every
/// termination except cancellation, which ends quietly with `None`. A clean
/// end of the response is an error too: a feed that closes its socket is
/// expected to be resumed.
///
/// Dropping the connection cancels the session.
pub struct Connection {
    events: TransportStream,
    cancel: CancellationToken,
    finished: bool,
}

impl Connection {
    /// Start a session. `parent` cancels the session when it fires.
    pub fn open(
        transport: &dyn SseTransport,
        request: &RequestConfig,
        parent: &CancellationToken,
    ) -> Self {
        let cancel = parent.child_token();
        tracing::debug!(url = %request.url(), "Opening connection");
        let events = transport.connect(request, cancel.clone());
        Self {
            events,
            cancel,
            finished: false,
        }
    }

    /// Tear the session down. No event is yielded after this returns.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.finished = true;
    }

    /// Next event of this session, `None` once it has ended.
    pub async fn next_event(&mut self) -> Option<Result<SseEvent<Bytes>, TransportError>> {
        loop {
            if self.finished {
                return None;
            }

            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    self.finished = true;
                    return None;
                }
                event = self.events.next() => event,
            };

            match event {
                Some(TransportEvent::ResponseReceived { status }) => {
                    tracing::debug!(status, "Connection opened");
                    return Some(Ok(SseEvent::ConnectionOpened));
                }
                Some(TransportEvent::Chunk(chunk)) => {
                    if chunk.len() > PRIMING_CHUNK_LEN {
                        return Some(Ok(SseEvent::DataReceived(chunk)));
                    }
                }
                Some(TransportEvent::Completed(Completion::Cancelled)) => {
                    self.finished = true;
                    return None;
                }
                Some(TransportEvent::Completed(Completion::Finished)) => {
                    self.finished = true;
                    return Some(Err(TransportError::CompletedWithoutError));
                }
                Some(TransportEvent::Completed(Completion::Failed(e))) => {
                    self.finished = true;
                    return Some(Err(e));
                }
                None => {
                    self.finished = true;
                    return Some(Err(TransportError::Closed));
                }
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
