//! Background loops owned by a till.
//!
//! Each function spawns one `tokio` task and returns its handle; the till
//! aborts them on shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::lifecycle::ShiftLifecycleManager;

/// Refresh the held shift's sales total on the configured interval.
#[must_use]
pub fn spawn_sales_refresh(manager: Arc<ShiftLifecycleManager>) -> JoinHandle<()> {
    let period = manager.settings().refresh_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; there is nothing to refresh yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if manager.active_shift().is_some() {
                if let Some(total) = manager.refresh_sales_total().await {
                    debug!(total = %total, "Periodic sales total refresh");
                }
            }
        }
    })
}

/// Clear a stuck active-shift check.
#[must_use]
pub fn spawn_watchdog(manager: Arc<ShiftLifecycleManager>) -> JoinHandle<()> {
    let period = manager.settings().watchdog_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            manager.watchdog_tick();
        }
    })
}

/// Re-read the active shift from the store each time connectivity returns,
/// replacing whatever the cache said while offline.
#[must_use]
pub fn spawn_reconnect_reconciler(manager: Arc<ShiftLifecycleManager>) -> JoinHandle<()> {
    let mut online = manager.connectivity().subscribe();
    tokio::spawn(async move {
        while online.changed().await.is_ok() {
            if !*online.borrow_and_update() {
                continue;
            }
            let employee_id = manager.operator().employee_id;
            let shift = manager.check_active_shift(employee_id, true).await;
            info!(
                employee_id = %employee_id,
                shift_id = ?shift.as_ref().map(|s| s.id),
                "Reconciled active shift after reconnect"
            );
        }
    })
}
