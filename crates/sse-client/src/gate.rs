//! Connectivity-aware wrapper around [`ReconnectPolicy`].

use sse_core::SseStrategy;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::connection::Connection;
use crate::reachability::ConnectivityStatus;
use crate::reconnect::{EventSink, ReconnectPolicy, RetryExit};
use crate::state::{SessionState, StateTracker};

/// Starts, stops and restarts the retrying stream as connectivity changes.
///
/// With [`SseStrategy::RetryOnError`] connectivity is ignored. With
/// [`SseStrategy::RetryOnConnectivity`] an attempt only runs while the
/// network is reachable; losing it cancels the attempt, regaining it starts
/// a fresh one. The latest reachable window always wins: its attempt
/// replaces whatever was running before.
pub struct ReachabilityGate {
    strategy: SseStrategy,
    connectivity: watch::Receiver<ConnectivityStatus>,
}

impl ReachabilityGate {
    pub fn new(strategy: SseStrategy, connectivity: watch::Receiver<ConnectivityStatus>) -> Self {
        Self {
            strategy,
            connectivity,
        }
    }

    /// Run until `session` is cancelled or the sink closes.
    pub async fn run<C, S>(
        &mut self,
        policy: &ReconnectPolicy,
        connect: &mut C,
        sink: &mut S,
        session: &CancellationToken,
        state: &StateTracker,
    ) -> RetryExit
    where
        C: FnMut(&CancellationToken) -> Connection + Send,
        S: EventSink + ?Sized,
    {
        match self.strategy {
            SseStrategy::RetryOnError => policy.run(connect, sink, session, state).await,
            SseStrategy::RetryOnConnectivity => {
                self.run_on_connectivity(policy, connect, sink, session, state)
                    .await
            }
        }
    }

    async fn run_on_connectivity<C, S>(
        &mut self,
        policy: &ReconnectPolicy,
        connect: &mut C,
        sink: &mut S,
        session: &CancellationToken,
        state: &StateTracker,
    ) -> RetryExit
    where
        C: FnMut(&CancellationToken) -> Connection + Send,
        S: EventSink + ?Sized,
    {
        // The one attempt allowed to run; replaced on every reachable window.
        let mut current: Option<CancellationToken> = None;

        loop {
            let reachable_now = self.connectivity.borrow().reachable;
            if !reachable_now {
                state.set(SessionState::WaitingForReachable);
            }

            let window = tokio::select! {
                biased;
                _ = session.cancelled() => return RetryExit::Cancelled,
                status = wait_for_status(&mut self.connectivity, |s| s.reachable) => match status {
                    Some(status) => status,
                    None => {
                        tracing::warn!("Connectivity signal dropped, ending session");
                        return RetryExit::Cancelled;
                    }
                },
            };

            let attempt = session.child_token();
            if let Some(previous) = current.replace(attempt.clone()) {
                previous.cancel();
            }
            tracing::info!(epoch = window.epoch, "Network reachable, starting stream");

            let exit = tokio::select! {
                biased;
                _ = session.cancelled() => {
                    attempt.cancel();
                    return RetryExit::Cancelled;
                }
                changed = wait_for_status(&mut self.connectivity, |s| s.epoch != window.epoch) => {
                    attempt.cancel();
                    if changed.is_none() {
                        tracing::warn!("Connectivity signal dropped, ending session");
                        return RetryExit::Cancelled;
                    }
                    None
                }
                exit = policy.run(connect, sink, &attempt, state) => Some(exit),
            };

            match exit {
                Some(exit) => return exit,
                None => {
                    state.set(SessionState::Disconnected);
                    tracing::warn!("Network unreachable, stream cancelled");
                }
            }
        }
    }
}

async fn wait_for_status(
    rx: &mut watch::Receiver<ConnectivityStatus>,
    predicate: impl FnMut(&ConnectivityStatus) -> bool + Send,
) -> Option<ConnectivityStatus> {
    rx.wait_for(predicate).await.ok().map(|status| *status)
}
