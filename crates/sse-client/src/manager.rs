//! Entry point: opens feeds and owns the shared collaborators.

use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use sse_core::{EventBatch, RequestConfig, SseEvent};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::connection::Connection;
use crate::error::SseError;
use crate::gate::ReachabilityGate;
use crate::http::ReqwestTransport;
use crate::reachability::{ConnectivityMonitor, Reachability, run_monitor};
use crate::reconnect::{EventSink, ReconnectPolicy};
use crate::settings::{ClientSettings, DEFAULT_EVENT_CHANNEL_CAPACITY};
use crate::state::{SessionState, StateTracker};
use crate::store::{KeyValueStore, LastEventIdStore};
use crate::transport::SseTransport;

/// Opens event feeds over a transport, persisting each feed's last event id
/// in a key-value store and gating reconnects on a shared connectivity
/// signal.
///
/// Construct one per application and pass it around; nothing is global.
pub struct SseManager {
    transport: Arc<dyn SseTransport>,
    last_event_ids: LastEventIdStore,
    reachability: Reachability,
    event_channel_capacity: usize,
    monitor: Mutex<Option<CancellationToken>>,
}

impl SseManager {
    pub fn new(transport: Arc<dyn SseTransport>, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            transport,
            last_event_ids: LastEventIdStore::new(store),
            reachability: Reachability::default(),
            event_channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
            monitor: Mutex::new(None),
        }
    }

    /// Manager over a [`ReqwestTransport`] configured from `settings`.
    pub fn from_settings(
        settings: &ClientSettings,
        store: Arc<dyn KeyValueStore>,
    ) -> Result<Self, SseError> {
        settings.validate()?;
        let transport = ReqwestTransport::new(settings.connect_timeout())?;
        Ok(Self::new(Arc::new(transport), store)
            .with_event_channel_capacity(settings.event_channel_capacity))
    }

    /// Batches buffered per feed. Zero is treated as one.
    #[must_use]
    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity.max(1);
        self
    }

    pub fn reachability(&self) -> &Reachability {
        &self.reachability
    }

    /// Inject a connectivity reading. Repeated values are ignored.
    pub fn trigger_reachable(&self, reachable: bool) {
        if self.reachability.set(reachable) {
            tracing::info!(reachable, "Connectivity changed");
        }
    }

    /// Poll `monitor` in the background, replacing any running monitor.
    /// Must be called within a Tokio runtime.
    pub fn start_monitor(&self, monitor: Arc<dyn ConnectivityMonitor>) {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.monitor_slot().replace(cancel.clone()) {
            previous.cancel();
        }
        tracing::debug!(
            interval_ms = monitor.poll_interval().as_millis() as u64,
            "Starting connectivity monitor"
        );
        tokio::spawn(run_monitor(monitor, self.reachability.clone(), cancel));
    }

    pub fn stop_monitor(&self) {
        if let Some(cancel) = self.monitor_slot().take() {
            tracing::debug!("Stopping connectivity monitor");
            cancel.cancel();
        }
    }

    fn monitor_slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn last_event_id(&self, request: &RequestConfig) -> Option<String> {
        self.last_event_ids.get(request)
    }

    /// `request` as it would be sent right now: protocol headers plus the
    /// stored `Last-Event-Id`, if any.
    pub fn request_with_default_params(&self, request: &RequestConfig) -> RequestConfig {
        self.last_event_ids.request_with_default_params(request)
    }

    /// Open a feed. It reconnects on its own until the returned stream is
    /// cancelled or dropped. Must be called within a Tokio runtime.
    pub fn open(&self, request: &RequestConfig) -> FeedStream {
        self.open_with_terminate(request, CancellationToken::new())
    }

    /// Like [`open`](Self::open), with `terminate` as an external terminate
    /// signal. Firing it ends the feed for good.
    pub fn open_with_terminate(
        &self,
        request: &RequestConfig,
        terminate: CancellationToken,
    ) -> FeedStream {
        let session = terminate.child_token();
        let state = StateTracker::new();
        let state_rx = state.subscribe();
        let (tx, rx) = mpsc::channel(self.event_channel_capacity);

        let driver = SessionDriver {
            transport: self.transport.clone(),
            last_event_ids: self.last_event_ids.clone(),
            request: request.clone(),
            reachability: self.reachability.clone(),
        };
        let sink = BatchDelivery {
            request: request.clone(),
            last_event_ids: self.last_event_ids.clone(),
            tx,
        };
        tokio::spawn(driver.run(sink, session.clone(), state));

        FeedStream {
            rx,
            state: state_rx,
            _guard: session.clone().drop_guard(),
            session,
        }
    }
}

impl Drop for SseManager {
    fn drop(&mut self) {
        self.stop_monitor();
    }
}

/// Everything one feed's background task needs. The feed keeps its own
/// handle on the connectivity signal, so it outlives the manager.
struct SessionDriver {
    transport: Arc<dyn SseTransport>,
    last_event_ids: LastEventIdStore,
    request: RequestConfig,
    reachability: Reachability,
}

impl SessionDriver {
    async fn run(self, mut sink: BatchDelivery, session: CancellationToken, state: StateTracker) {
        let Self {
            transport,
            last_event_ids,
            request,
            reachability,
        } = self;

        tracing::info!(
            url = %request.url(),
            strategy = ?request.strategy(),
            "Opening event feed"
        );
        let policy = ReconnectPolicy::new(request.retry_delay());
        let mut gate = ReachabilityGate::new(request.strategy(), reachability.subscribe());

        // Re-derived per attempt so a reconnect resumes from the latest id.
        let mut connect = |token: &CancellationToken| {
            let prepared = last_event_ids.request_with_default_params(&request);
            Connection::open(transport.as_ref(), &prepared, token)
        };

        let exit = gate
            .run(&policy, &mut connect, &mut sink, &session, &state)
            .await;
        state.set(SessionState::Terminated);
        tracing::info!(url = %request.url(), ?exit, "Event feed terminated");
    }
}

/// Parses each chunk into a batch, records its last event id and hands it to
/// the consumer.
struct BatchDelivery {
    request: RequestConfig,
    last_event_ids: LastEventIdStore,
    tx: mpsc::Sender<EventBatch>,
}

#[async_trait]
impl EventSink for BatchDelivery {
    async fn deliver(&mut self, event: SseEvent<Bytes>) -> bool {
        let batch: EventBatch = match event {
            SseEvent::ConnectionOpened => vec![SseEvent::ConnectionOpened],
            SseEvent::DataReceived(chunk) => sse_core::parse(&chunk),
            SseEvent::Dummy => vec![SseEvent::Dummy],
        };
        if batch.is_empty() {
            return !self.tx.is_closed();
        }

        // A reserved slot cannot fail, so the id only advances for batches
        // the consumer will receive.
        let Ok(permit) = self.tx.reserve().await else {
            return false;
        };
        if let Err(e) = self.last_event_ids.record_batch(&self.request, &batch) {
            tracing::warn!(url = %self.request.url(), "Failed to persist last event id: {e}");
        }
        permit.send(batch);
        true
    }
}

/// Batches of one open feed, in arrival order.
///
/// Ends once the feed terminates. Dropping it cancels the feed.
pub struct FeedStream {
    rx: mpsc::Receiver<EventBatch>,
    state: watch::Receiver<SessionState>,
    session: CancellationToken,
    _guard: DropGuard,
}

impl FeedStream {
    /// Next batch, `None` once the feed has terminated.
    pub async fn next_batch(&mut self) -> Option<EventBatch> {
        self.rx.recv().await
    }

    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<SessionState> {
        self.state.clone()
    }

    pub fn terminate_handle(&self) -> TerminateHandle {
        TerminateHandle {
            token: self.session.clone(),
        }
    }

    /// Terminate the feed. Batches already buffered can still be read.
    pub fn cancel(&self) {
        self.session.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.session.is_cancelled()
    }
}

impl Stream for FeedStream {
    type Item = EventBatch;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl std::fmt::Debug for FeedStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedStream")
            .field("state", &*self.state.borrow())
            .field("cancelled", &self.session.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Write-only terminate signal for one feed.
#[derive(Debug, Clone)]
pub struct TerminateHandle {
    token: CancellationToken,
}

impl TerminateHandle {
    pub fn terminate(&self) {
        self.token.cancel();
    }

    pub fn is_terminated(&self) -> bool {
        self.token.is_cancelled()
    }
}
