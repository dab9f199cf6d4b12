//! Unified error handling for the till API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::{ShiftError, ShiftOwner};

/// Application-level error type for the till API.
#[derive(Debug, Error)]
pub enum AppError {
    /// Shift lifecycle operation failed.
    #[error("Shift error: {0}")]
    Shift(#[from] ShiftError),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable machine-readable kind.
    pub error: &'static str,
    /// Text for the operator.
    pub message: String,
}

impl AppError {
    const fn status(&self) -> StatusCode {
        match self {
            Self::Shift(e) => match e {
                ShiftError::ActiveShiftExists { .. }
                | ShiftError::NoActiveShift
                | ShiftError::CloseInProgress => StatusCode::CONFLICT,
                ShiftError::InvalidAmount(_) => StatusCode::BAD_REQUEST,
                e if e.is_network() => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn kind(&self) -> &'static str {
        match self {
            Self::Shift(e) => match e {
                ShiftError::ActiveShiftExists {
                    owner: ShiftOwner::Caller,
                    ..
                } => "active_shift_exists_self",
                ShiftError::ActiveShiftExists { .. } => "active_shift_exists_other",
                ShiftError::NoActiveShift => "no_active_shift",
                ShiftError::OfflineCannotClose => "offline_cannot_close",
                ShiftError::CloseInProgress => "close_in_progress",
                ShiftError::ExistenceUnverified(_) => "existence_unverified",
                ShiftError::InvalidAmount(_) => "invalid_amount",
                e if e.is_network() => "network",
                _ => "internal",
            },
            Self::BadRequest(_) => "bad_request",
            Self::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Till request error"
            );
        } else if status.is_server_error() {
            tracing::warn!(error = %self, "Till request failed, store unreachable");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Shift(e) => e.user_message(),
            Self::BadRequest(reason) => reason.clone(),
            Self::Internal(_) => "Internal server error".to_string(),
        };

        let body = ErrorBody {
            error: self.kind(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use fuel_station_core::{EmployeeId, ShiftId};

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(ShiftError::ActiveShiftExists {
                owner: ShiftOwner::OtherEmployee(EmployeeId::new(3)),
                shift_id: Some(ShiftId::new(1)),
            }),
            StatusCode::CONFLICT
        );
        assert_eq!(get_status(ShiftError::NoActiveShift), StatusCode::CONFLICT);
        assert_eq!(
            get_status(ShiftError::OfflineCannotClose),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(ShiftError::Store(StoreError::Timeout)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            get_status(ShiftError::Store(StoreError::DataCorruption("bad".into()))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_error_kinds_distinguish_owner() {
        let own = AppError::from(ShiftError::ActiveShiftExists {
            owner: ShiftOwner::Caller,
            shift_id: None,
        });
        let other = AppError::from(ShiftError::ActiveShiftExists {
            owner: ShiftOwner::Unidentified,
            shift_id: None,
        });
        assert_eq!(own.kind(), "active_shift_exists_self");
        assert_eq!(other.kind(), "active_shift_exists_other");
    }
}
