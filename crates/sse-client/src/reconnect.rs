//! Retry forever after a fixed delay, except on cancellation.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sse_core::SseEvent;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::state::{SessionState, StateTracker};

/// Receives every event of every connection attempt, in order.
#[async_trait]
pub trait EventSink: Send {
    /// Returns `false` once the consumer is gone.
    async fn deliver(&mut self, event: SseEvent<Bytes>) -> bool;
}

/// Why [`ReconnectPolicy::run`] stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryExit {
    Cancelled,
    ConsumerClosed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    retry_delay: Duration,
}

impl ReconnectPolicy {
    pub fn new(retry_delay: Duration) -> Self {
        Self { retry_delay }
    }

    /// Open connections with `connect` until `cancel` fires or the sink
    /// closes. Every connection error, including a clean end of the
    /// response, is followed by `retry_delay` and a fresh attempt. Each
    /// attempt starts from scratch; nothing is carried over.
    ///
    /// At most one connection is alive at a time: the previous one is
    /// dropped, and therefore cancelled, before the next is opened.
    pub async fn run<C, S>(
        &self,
        connect: &mut C,
        sink: &mut S,
        cancel: &CancellationToken,
        state: &StateTracker,
    ) -> RetryExit
    where
        C: FnMut(&CancellationToken) -> Connection + Send,
        S: EventSink + ?Sized,
    {
        let mut attempt: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return RetryExit::Cancelled;
            }

            attempt += 1;
            state.set(SessionState::Connecting);
            tracing::info!(attempt, "Connecting to event stream");
            let mut connection = connect(cancel);

            let failure = loop {
                match connection.next_event().await {
                    None => return RetryExit::Cancelled,
                    Some(Ok(event)) => {
                        state.set(match event {
                            SseEvent::ConnectionOpened => SessionState::Open,
                            _ => SessionState::Streaming,
                        });
                        let delivered = tokio::select! {
                            biased;
                            _ = cancel.cancelled() => return RetryExit::Cancelled,
                            delivered = sink.deliver(event) => delivered,
                        };
                        if !delivered {
                            tracing::info!("Event consumer closed, stopping");
                            return RetryExit::ConsumerClosed;
                        }
                    }
                    Some(Err(e)) => break e,
                }
            };
            drop(connection);

            state.set(SessionState::RetryWait);
            tracing::warn!(
                attempt,
                error = %failure,
                delay_ms = self.retry_delay.as_millis() as u64,
                "Connection ended, reconnecting after delay"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return RetryExit::Cancelled,
                _ = tokio::time::sleep(self.retry_delay) => {}
            }
        }
    }
}
