//! Online/offline signal for a till.
//!
//! The flag is a `tokio::sync::watch` channel so background tasks can react
//! to transitions (reconciling the cache once the store is reachable again).

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Shared connectivity flag.
#[derive(Clone, Debug)]
pub struct ConnectivityMonitor {
    tx: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    /// Create a monitor with an initial state.
    #[must_use]
    pub fn new(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx: Arc::new(tx) }
    }

    /// Whether the store is currently believed reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    /// Record a new state. Returns `true` if it changed.
    pub fn set_online(&self, online: bool) -> bool {
        let previous = self.tx.send_replace(online);
        if previous != online {
            if online {
                info!("Connectivity restored");
            } else {
                warn!("Connectivity lost, shift reads fall back to the local cache");
            }
        }
        previous != online
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }

    /// Probe the database once and record the result.
    pub async fn probe(&self, pool: &PgPool) -> bool {
        let online = sqlx::query("SELECT 1").fetch_one(pool).await.is_ok();
        self.set_online(online);
        online
    }

    /// Probe the database on a fixed interval until the task is aborted.
    #[must_use]
    pub fn spawn_probe(&self, pool: PgPool, interval: Duration) -> JoinHandle<()> {
        let monitor = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                monitor.probe(&pool).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_online_reports_changes() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(monitor.is_online());
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.is_online());
    }

    #[tokio::test]
    async fn test_subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(false);
        let mut rx = monitor.subscribe();

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow());
    }

    #[test]
    fn test_clones_share_state() {
        let monitor = ConnectivityMonitor::new(true);
        let clone = monitor.clone();
        clone.set_online(false);
        assert!(!monitor.is_online());
    }
}
