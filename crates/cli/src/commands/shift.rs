//! One-shot shift lifecycle commands.
//!
//! Each invocation acts as a short-lived till: it loads the till
//! configuration, probes the database, and runs a single operation through
//! the same lifecycle manager the till agent uses, sharing its local cache
//! file.
//!
//! # Usage
//!
//! ```bash
//! fs-cli shift status
//! fs-cli shift begin --opening-cash 150.00 --staff 14
//! fs-cli shift end --closing-cash 980.50 -p cash=700 -p card=280.50:BATCH-19
//! ```
//!
//! # Environment Variables
//!
//! Same as the till agent; see `fuel_station_shifts::config`.

use std::sync::Arc;

use rust_decimal::Decimal;
use thiserror::Error;

use fuel_station_core::{EmployeeId, Money, PaymentMethod};
use fuel_station_shifts::cache::{FileCache, LocalCache};
use fuel_station_shifts::config::{ConfigError, TillConfig};
use fuel_station_shifts::connectivity::ConnectivityMonitor;
use fuel_station_shifts::db::{self, PgShiftStore};
use fuel_station_shifts::models::{PaymentMethodEntry, Shift};
use fuel_station_shifts::services::{ShiftError, ShiftLifecycleManager};
use fuel_station_shifts::store::ShiftStore;

/// Errors that can occur during shift commands.
#[derive(Debug, Error)]
pub enum ShiftCommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database URL could not be parsed.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// The lifecycle operation was refused or failed.
    #[error("{}", .0.user_message())]
    Shift(#[from] ShiftError),

    /// A `--payment` argument was malformed.
    #[error("Invalid payment '{0}': {1}")]
    InvalidPayment(String, String),
}

/// Show the open shift visible to `employee` (default: the operator).
pub async fn status(employee: Option<EmployeeId>) -> Result<(), ShiftCommandError> {
    let manager = connect().await?;
    let employee_id = employee.unwrap_or(manager.operator().employee_id);

    match manager.check_active_shift(employee_id, true).await {
        Some(shift) => log_shift("Open shift", &shift),
        None => tracing::info!("No open shift"),
    }
    if !manager.connectivity().is_online() {
        tracing::warn!("Database unreachable, answer taken from the local cache");
    }
    Ok(())
}

/// Open a shift for the operator.
pub async fn begin(
    opening_cash: Decimal,
    staff: Vec<EmployeeId>,
) -> Result<(), ShiftCommandError> {
    let manager = connect().await?;
    let roster = (!staff.is_empty()).then_some(staff);

    let shift = manager.begin(Money::new(opening_cash), roster).await?;
    log_shift("Shift opened", &shift);
    Ok(())
}

/// Close the operator's open shift.
pub async fn end(closing_cash: Decimal, payments: &[String]) -> Result<(), ShiftCommandError> {
    let entries = payments
        .iter()
        .map(|raw| parse_payment(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let manager = connect().await?;
    // Pick up the shift this operator left open.
    manager
        .check_active_shift(manager.operator().employee_id, true)
        .await;

    let shift = manager
        .end(
            Money::new(closing_cash),
            (!entries.is_empty()).then_some(entries),
        )
        .await?;
    log_shift("Shift closed", &shift);

    for method in manager.snapshot().shift_payment_methods {
        tracing::info!(
            "  {}: {}{}",
            method.payment_method,
            method.amount,
            method
                .reference
                .map(|r| format!(" ({r})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn connect() -> Result<ShiftLifecycleManager, ShiftCommandError> {
    let config = TillConfig::from_env()?;

    let pool = db::create_pool(&config.database_url)?;
    let connectivity = ConnectivityMonitor::new(false);
    if !connectivity.probe(&pool).await {
        tracing::warn!("Database unreachable, running offline");
    }

    let store: Arc<dyn ShiftStore> = Arc::new(PgShiftStore::new(pool));
    let cache: Arc<dyn LocalCache> = Arc::new(FileCache::new(&config.cache_path));

    Ok(ShiftLifecycleManager::new(
        config.operator,
        store,
        cache,
        connectivity,
        config.shifts,
    ))
}

fn log_shift(label: &str, shift: &Shift) {
    tracing::info!("{label}: #{}", shift.id);
    tracing::info!("  Employee: {}", shift.employee_id);
    tracing::info!("  Status: {}", shift.status);
    tracing::info!("  Opened: {}", shift.start_time);
    tracing::info!("  Opening cash: {}", shift.opening_cash);
    tracing::info!("  Sales total: {}", shift.sales_total);
    if let Some(closing_cash) = shift.closing_cash {
        tracing::info!("  Closing cash: {}", closing_cash);
    }
    if let Some(end_time) = shift.end_time {
        tracing::info!("  Closed: {}", end_time);
    }
}

/// Parse `method=amount[:reference]`.
fn parse_payment(raw: &str) -> Result<PaymentMethodEntry, ShiftCommandError> {
    let invalid = |reason: &str| ShiftCommandError::InvalidPayment(raw.to_owned(), reason.to_owned());

    let (method, rest) = raw
        .split_once('=')
        .ok_or_else(|| invalid("expected method=amount"))?;
    let method: PaymentMethod = method.trim().parse().map_err(|e: String| invalid(&e))?;

    let (amount, reference) = match rest.split_once(':') {
        Some((amount, reference)) => (amount, Some(reference.trim().to_owned())),
        None => (rest, None),
    };
    let amount: Decimal = amount
        .trim()
        .parse()
        .map_err(|_| invalid("amount is not a number"))?;

    Ok(PaymentMethodEntry {
        payment_method: method,
        amount: Money::new(amount),
        reference: reference.filter(|r| !r.is_empty()),
    })
}
