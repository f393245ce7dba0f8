//! In-process transport for tests.

use std::sync::{Arc, Mutex};

use sse_core::RequestConfig;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::transport::{Completion, SseTransport, TransportEvent, TransportStream};

enum ScriptEnd {
    Complete(Completion),
    /// Stay open until cancelled.
    Hang,
}

/// What one session delivers.
pub(crate) struct Script {
    events: Vec<TransportEvent>,
    end: ScriptEnd,
}

impl Script {
    pub(crate) fn events(events: Vec<TransportEvent>) -> Self {
        Self {
            events,
            end: ScriptEnd::Hang,
        }
    }

    pub(crate) fn then(mut self, completion: Completion) -> Self {
        self.end = ScriptEnd::Complete(completion);
        self
    }

    pub(crate) fn hang(mut self) -> Self {
        self.end = ScriptEnd::Hang;
        self
    }
}

struct Session {
    request: RequestConfig,
    cancel: CancellationToken,
    hangs: bool,
}

type ScriptFn = dyn Fn(usize) -> Script + Send + Sync;

/// Replays a script per connection attempt and records every attempt.
#[derive(Clone)]
pub(crate) struct ScriptedTransport {
    script: Arc<ScriptFn>,
    sessions: Arc<Mutex<Vec<Session>>>,
}

impl ScriptedTransport {
    /// `script` receives the zero-based attempt number.
    pub(crate) fn new(script: impl Fn(usize) -> Script + Send + Sync + 'static) -> Self {
        Self {
            script: Arc::new(script),
            sessions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub(crate) fn requests(&self) -> Vec<RequestConfig> {
        let sessions = self.sessions.lock().unwrap();
        sessions.iter().map(|s| s.request.clone()).collect()
    }

    pub(crate) fn session_tokens(&self) -> Vec<CancellationToken> {
        let sessions = self.sessions.lock().unwrap();
        sessions.iter().map(|s| s.cancel.clone()).collect()
    }

    /// Sessions that are still open: hanging and not cancelled.
    pub(crate) fn live_sessions(&self) -> usize {
        let sessions = self.sessions.lock().unwrap();
        sessions
            .iter()
            .filter(|s| s.hangs && !s.cancel.is_cancelled())
            .count()
    }
}

impl SseTransport for ScriptedTransport {
    fn connect(&self, request: &RequestConfig, cancel: CancellationToken) -> TransportStream {
        let Script { events, end } = {
            let attempt = self.attempts();
            (self.script)(attempt)
        };
        let hangs = matches!(end, ScriptEnd::Hang);
        self.sessions.lock().unwrap().push(Session {
            request: request.clone(),
            cancel: cancel.clone(),
            hangs,
        });

        let (tx, rx) = mpsc::unbounded_channel();
        for event in events {
            let _ = tx.send(event);
        }
        match end {
            ScriptEnd::Complete(completion) => {
                let _ = tx.send(TransportEvent::Completed(completion));
            }
            ScriptEnd::Hang => {
                tokio::spawn(async move {
                    cancel.cancelled().await;
                    let _ = tx.send(TransportEvent::Completed(Completion::Cancelled));
                });
            }
        }

        Box::pin(UnboundedReceiverStream::new(rx))
    }
}
