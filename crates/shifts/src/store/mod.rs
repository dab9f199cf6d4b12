//! The durable shift store seam.
//!
//! [`ShiftStore`] is everything the lifecycle manager needs from the back
//! office database: shift point queries, inserts and updates, the
//! payment-method batch write, the sale-amount query behind the running
//! total, and the staff-record prerequisite.
//!
//! Two implementations ship:
//!
//! - [`crate::db::PgShiftStore`] - `PostgreSQL`, the production store
//! - [`memory::InMemoryShiftStore`] - same semantics in process, with fault
//!   injection for tests and simulations
//!
//! Both enforce "at most one open shift" on insert and report a violation as
//! [`StoreError::Conflict`].

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

use fuel_station_core::{EmployeeId, Money, ShiftId};

use crate::models::{
    CloseShift, Employee, NewEmployee, NewShift, PaymentMethodEntry, Shift, ShiftPaymentMethod,
};

pub use memory::{InMemoryShiftStore, StoreOperation};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store could not be reached (connection refused, reset, DNS).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store did not answer in time.
    #[error("store operation timed out")]
    Timeout,

    /// Constraint violation (e.g. a second open shift).
    #[error("constraint violation: {0}")]
    Conflict(String),

    /// The shift exists but is not open.
    #[error("shift {0} is not open")]
    NotOpen(ShiftId),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Data in the store is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Any other database failure.
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout)
    }

    /// Whether the failure is a connectivity problem rather than a
    /// rejection by the store.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        self.is_transient()
    }
}

/// Durable storage for shifts and everything hanging off them.
#[async_trait]
pub trait ShiftStore: Send + Sync {
    /// Any open shift in the system (at most one exists).
    async fn find_open_shift(&self) -> Result<Option<Shift>, StoreError>;

    /// The open shift owned by `employee_id`, if any.
    async fn find_open_shift_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Option<Shift>, StoreError>;

    /// Point lookup by id.
    async fn get_shift(&self, id: ShiftId) -> Result<Option<Shift>, StoreError>;

    /// Insert a new open shift.
    ///
    /// Returns [`StoreError::Conflict`] when another shift is already open.
    async fn insert_shift(&self, new: NewShift) -> Result<Shift, StoreError>;

    /// Mark an open shift closed.
    ///
    /// Returns [`StoreError::NotOpen`] when the shift is already closed and
    /// [`StoreError::NotFound`] when it does not exist. Never reopens.
    async fn close_shift(&self, id: ShiftId, close: CloseShift) -> Result<Shift, StoreError>;

    /// Replace the payment-method batch of a closed shift as one unit.
    ///
    /// Writing the same batch twice leaves exactly one copy.
    async fn replace_payment_methods(
        &self,
        shift_id: ShiftId,
        entries: &[PaymentMethodEntry],
    ) -> Result<Vec<ShiftPaymentMethod>, StoreError>;

    /// Payment-method records of a shift.
    async fn payment_methods(&self, shift_id: ShiftId)
    -> Result<Vec<ShiftPaymentMethod>, StoreError>;

    /// Amounts of all sales tagged with `shift_id`. Missing amounts are `None`.
    async fn sale_amounts(&self, shift_id: ShiftId) -> Result<Vec<Option<Money>>, StoreError>;

    /// Whether a staff record exists.
    async fn employee_exists(&self, id: EmployeeId) -> Result<bool, StoreError>;

    /// Create a staff record. Returns the existing record if one appeared
    /// concurrently.
    async fn insert_employee(&self, new: NewEmployee) -> Result<Employee, StoreError>;
}
