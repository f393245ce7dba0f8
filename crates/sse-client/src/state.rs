use std::fmt;

use tokio::sync::watch;

/// Lifecycle of one open feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Streaming,
    RetryWait,
    Disconnected,
    WaitingForReachable,
    /// Terminal.
    Terminated,
}

impl SessionState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Streaming => "streaming",
            Self::RetryWait => "retry_wait",
            Self::Disconnected => "disconnected",
            Self::WaitingForReachable => "waiting_for_reachable",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Publishes session state changes. Nothing leaves `Terminated`.
#[derive(Debug)]
pub struct StateTracker {
    tx: watch::Sender<SessionState>,
}

impl StateTracker {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Idle);
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> SessionState {
        *self.tx.borrow()
    }

    pub fn set(&self, next: SessionState) {
        self.tx.send_if_modified(|state| {
            if *state == next || state.is_terminated() {
                return false;
            }
            tracing::debug!(from = %state, to = %next, "Session state changed");
            *state = next;
            true
        });
    }
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_published() {
        let tracker = StateTracker::new();
        let rx = tracker.subscribe();
        assert_eq!(*rx.borrow(), SessionState::Idle);

        tracker.set(SessionState::Connecting);
        assert_eq!(*rx.borrow(), SessionState::Connecting);
        assert_eq!(tracker.current(), SessionState::Connecting);
    }

    #[test]
    fn test_terminated_is_final() {
        let tracker = StateTracker::new();
        tracker.set(SessionState::Terminated);
        tracker.set(SessionState::Connecting);
        assert_eq!(tracker.current(), SessionState::Terminated);
    }
}
