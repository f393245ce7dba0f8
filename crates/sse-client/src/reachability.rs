//! Connectivity signal and the monitors that feed it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

pub const DEFAULT_PROBE_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Current connectivity. `epoch` increases on every change, so a reader
/// that missed a short outage still sees that one happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityStatus {
    pub reachable: bool,
    pub epoch: u64,
}

/// De-duplicated reachability signal shared by a manager and its sessions.
/// Starts out reachable.
#[derive(Debug, Clone)]
pub struct Reachability {
    tx: Arc<watch::Sender<ConnectivityStatus>>,
}

impl Reachability {
    pub fn new(initial: bool) -> Self {
        let (tx, _) = watch::channel(ConnectivityStatus {
            reachable: initial,
            epoch: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    /// Publish a reading. Returns whether it changed the signal.
    pub fn set(&self, reachable: bool) -> bool {
        self.tx.send_if_modified(|status| {
            if status.reachable == reachable {
                return false;
            }
            status.reachable = reachable;
            status.epoch += 1;
            true
        })
    }

    pub fn status(&self) -> ConnectivityStatus {
        *self.tx.borrow()
    }

    pub fn is_reachable(&self) -> bool {
        self.status().reachable
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectivityStatus> {
        self.tx.subscribe()
    }
}

impl Default for Reachability {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Source of connectivity readings, polled by [`run_monitor`].
#[async_trait]
pub trait ConnectivityMonitor: Send + Sync {
    async fn check(&self) -> bool;

    fn poll_interval(&self) -> Duration {
        DEFAULT_PROBE_INTERVAL
    }
}

/// Considers the network reachable when a TCP connection to `addr` can be
/// opened within the timeout.
#[derive(Debug, Clone)]
pub struct TcpProbeMonitor {
    addr: String,
    timeout: Duration,
    interval: Duration,
}

impl TcpProbeMonitor {
    /// `addr` is a `host:port` pair.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_PROBE_TIMEOUT,
            interval: DEFAULT_PROBE_INTERVAL,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }
}

#[async_trait]
impl ConnectivityMonitor for TcpProbeMonitor {
    async fn check(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(addr = %self.addr, "Connectivity probe failed: {e}");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %self.addr, "Connectivity probe timed out");
                false
            }
        }
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }
}

/// Poll `monitor` and publish its readings until `cancel` fires.
pub async fn run_monitor(
    monitor: Arc<dyn ConnectivityMonitor>,
    reachability: Reachability,
    cancel: CancellationToken,
) {
    loop {
        let reachable = tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            reachable = monitor.check() => reachable,
        };
        if reachability.set(reachable) {
            tracing::info!(reachable, "Connectivity changed");
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(monitor.poll_interval()) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct FlagMonitor(Arc<AtomicBool>);

    #[async_trait]
    impl ConnectivityMonitor for FlagMonitor {
        async fn check(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }

        fn poll_interval(&self) -> Duration {
            Duration::from_millis(100)
        }
    }

    #[test]
    fn test_set_deduplicates() {
        let reachability = Reachability::default();
        let mut rx = reachability.subscribe();
        rx.mark_unchanged();

        assert!(!reachability.set(true));
        assert!(!rx.has_changed().unwrap());

        assert!(reachability.set(false));
        assert!(rx.has_changed().unwrap());
        assert_eq!(
            reachability.status(),
            ConnectivityStatus {
                reachable: false,
                epoch: 1
            }
        );
    }

    #[test]
    fn test_epoch_records_missed_flips() {
        let reachability = Reachability::default();
        reachability.set(false);
        reachability.set(true);
        let status = reachability.status();
        assert!(status.reachable);
        assert_eq!(status.epoch, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_monitor_publishes_changes() {
        let flag = Arc::new(AtomicBool::new(true));
        let reachability = Reachability::default();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_monitor(
            Arc::new(FlagMonitor(flag.clone())),
            reachability.clone(),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(reachability.is_reachable());

        flag.store(false, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!reachability.is_reachable());

        flag.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(reachability.is_reachable());
        assert_eq!(reachability.status().epoch, 2);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_tcp_probe() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let probe = TcpProbeMonitor::new(addr.to_string()).timeout(Duration::from_secs(1));
        assert!(probe.check().await);

        drop(listener);
        assert!(!probe.check().await);
    }
}
