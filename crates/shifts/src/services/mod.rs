//! Shift business logic.
//!
//! # Services
//!
//! - `lifecycle` - the per-till shift state machine and invariant checks
//! - `payments` - sales totals and payment breakdown sums
//! - `reconcile` - merge of store answers and cached snapshots
//! - `retry` - bounded linear backoff for transient store failures
//! - `tasks` - background refresh, watchdog and reconnect loops

pub mod error;
pub mod lifecycle;
pub mod payments;
pub mod reconcile;
pub mod retry;
pub mod tasks;

pub use error::{ShiftError, ShiftOwner};
pub use lifecycle::{PhaseKind, ShiftLifecycleManager, ShiftPhase, ShiftSettings, ShiftSnapshot};
pub use payments::PaymentAggregator;
pub use reconcile::{CacheWrite, Observation, Resolution, reconcile};
pub use retry::{RetryPolicy, retry_transient};
pub use tasks::{spawn_reconnect_reconciler, spawn_sales_refresh, spawn_watchdog};
