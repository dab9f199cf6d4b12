//! HTTP route handlers for the till agent.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                 - Liveness
//! GET  /health/ready           - Database reachability
//!
//! # Shifts
//! GET  /api/shifts/active      - Open shift as seen by an employee
//! POST /api/shifts/begin       - Open a shift for the operator
//! POST /api/shifts/end         - Close the held shift
//! GET  /api/shifts/state       - Derived state for the UI
//! ```

pub mod shifts;

use axum::Router;

use crate::state::AppState;

/// Build the complete API router.
pub fn routes() -> Router<AppState> {
    Router::new().merge(shifts::router())
}
