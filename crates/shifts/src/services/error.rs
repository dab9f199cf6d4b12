//! Shift lifecycle errors.

use std::fmt;

use thiserror::Error;

use fuel_station_core::{EmployeeId, ShiftId};

use crate::store::StoreError;

/// Who holds the shift that blocked a `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShiftOwner {
    /// The employee calling `begin`.
    Caller,
    /// Another employee.
    OtherEmployee(EmployeeId),
    /// The store rejected the insert but the winning shift could not be read.
    Unidentified,
}

impl fmt::Display for ShiftOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Caller => write!(f, "held by you"),
            Self::OtherEmployee(id) => write!(f, "held by employee {id}"),
            Self::Unidentified => write!(f, "owner unknown"),
        }
    }
}

/// Errors returned by [`super::ShiftLifecycleManager`].
#[derive(Debug, Error)]
pub enum ShiftError {
    /// `begin` rejected: an open shift already exists.
    #[error("an open shift already exists ({owner})")]
    ActiveShiftExists {
        owner: ShiftOwner,
        shift_id: Option<ShiftId>,
    },

    /// `end` called without a held open shift.
    #[error("no active shift to close")]
    NoActiveShift,

    /// `end` called while the till is offline.
    #[error("cannot close a shift while offline")]
    OfflineCannotClose,

    /// A close of the held shift is already running.
    #[error("shift close already in progress")]
    CloseInProgress,

    /// `begin` refused because no definitive answer about existing open
    /// shifts could be obtained.
    #[error("could not verify that no shift is open: {0}")]
    ExistenceUnverified(#[source] StoreError),

    /// A cash amount or payment line was rejected before touching the store.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// The shift closed but its payment breakdown was not recorded.
    #[error("shift {shift_id} closed but payment methods were not recorded: {source}")]
    PartialCloseFailure {
        shift_id: ShiftId,
        #[source]
        source: StoreError,
    },

    /// Store failure, after retries where they apply.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ShiftError {
    /// Whether the failure is a connectivity problem.
    #[must_use]
    pub const fn is_network(&self) -> bool {
        match self {
            Self::OfflineCannotClose => true,
            Self::Store(e) | Self::ExistenceUnverified(e) => e.is_network(),
            _ => false,
        }
    }

    /// Text for the operator, phrased so they know whether to wait, find a
    /// colleague, or reconnect.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::ActiveShiftExists {
                owner: ShiftOwner::Caller,
                ..
            } => "You already have an open shift. Close it before starting a new one.".to_string(),
            Self::ActiveShiftExists {
                owner: ShiftOwner::OtherEmployee(_) | ShiftOwner::Unidentified,
                ..
            } => "Another employee has an open shift. Ask them to close it first.".to_string(),
            Self::NoActiveShift => "There is no open shift to close.".to_string(),
            Self::OfflineCannotClose => {
                "You're offline. Reconnect to close the shift.".to_string()
            }
            Self::CloseInProgress => "The shift is already being closed.".to_string(),
            Self::InvalidAmount(reason) => format!("Invalid amount: {reason}."),
            e if e.is_network() => {
                "You're offline or the server is unreachable. Check the connection and try again."
                    .to_string()
            }
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}
