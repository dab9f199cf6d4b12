//! Shift API handlers.
//!
//! The browser UI on the till calls these; every handler is a thin shell
//! over [`crate::services::ShiftLifecycleManager`].

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use fuel_station_core::{EmployeeId, Money};

use crate::error::AppError;
use crate::models::{PaymentMethodEntry, Shift, ShiftPaymentMethod};
use crate::services::ShiftSnapshot;
use crate::state::AppState;

/// Build the shifts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/shifts/active", get(active_shift))
        .route("/api/shifts/begin", post(begin_shift))
        .route("/api/shifts/end", post(end_shift))
        .route("/api/shifts/state", get(shift_state))
}

// =============================================================================
// API Types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct ActiveShiftQuery {
    /// Defaults to the till's operator.
    pub employee_id: Option<EmployeeId>,
    #[serde(default)]
    pub skip_cache: bool,
}

#[derive(Debug, Serialize)]
pub struct ActiveShiftResponse {
    pub shift: Option<Shift>,
    pub online: bool,
}

#[derive(Debug, Deserialize)]
pub struct BeginShiftRequest {
    pub opening_cash: Money,
    pub employee_ids: Option<Vec<EmployeeId>>,
}

#[derive(Debug, Deserialize)]
pub struct EndShiftRequest {
    pub closing_cash: Money,
    pub payment_methods: Option<Vec<PaymentMethodEntry>>,
}

#[derive(Debug, Serialize)]
pub struct EndShiftResponse {
    pub shift: Shift,
    pub shift_payment_methods: Vec<ShiftPaymentMethod>,
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/shifts/active
#[instrument(skip(state))]
async fn active_shift(
    State(state): State<AppState>,
    Query(query): Query<ActiveShiftQuery>,
) -> Json<ActiveShiftResponse> {
    let manager = state.manager();
    let employee_id = query
        .employee_id
        .unwrap_or(manager.operator().employee_id);
    let shift = manager
        .check_active_shift(employee_id, query.skip_cache)
        .await;

    Json(ActiveShiftResponse {
        shift,
        online: manager.connectivity().is_online(),
    })
}

/// POST /api/shifts/begin
///
/// # Errors
///
/// 409 when an open shift exists, 503 when the store is unreachable.
#[instrument(skip(state, body))]
async fn begin_shift(
    State(state): State<AppState>,
    Json(body): Json<BeginShiftRequest>,
) -> Result<(StatusCode, Json<Shift>), AppError> {
    let shift = state
        .manager()
        .begin(body.opening_cash, body.employee_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(shift)))
}

/// POST /api/shifts/end
///
/// # Errors
///
/// 409 without a held shift, 503 while offline.
#[instrument(skip(state, body))]
async fn end_shift(
    State(state): State<AppState>,
    Json(body): Json<EndShiftRequest>,
) -> Result<Json<EndShiftResponse>, AppError> {
    let manager = state.manager();
    let shift = manager.end(body.closing_cash, body.payment_methods).await?;

    Ok(Json(EndShiftResponse {
        shift,
        shift_payment_methods: manager.snapshot().shift_payment_methods,
    }))
}

/// GET /api/shifts/state
async fn shift_state(State(state): State<AppState>) -> Json<ShiftSnapshot> {
    Json(state.manager().snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::{Request, header};
    use secrecy::SecretString;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::cache::{LocalCache, MemoryCache};
    use crate::connectivity::ConnectivityMonitor;
    use crate::models::OperatorProfile;
    use crate::services::{ShiftLifecycleManager, ShiftSettings};
    use crate::store::{InMemoryShiftStore, ShiftStore};

    struct Harness {
        store: Arc<InMemoryShiftStore>,
        connectivity: ConnectivityMonitor,
        state: AppState,
    }

    fn harness(employee: i32) -> Harness {
        let store = Arc::new(InMemoryShiftStore::new());
        harness_with_store(&store, employee)
    }

    fn harness_with_store(store: &Arc<InMemoryShiftStore>, employee: i32) -> Harness {
        let connectivity = ConnectivityMonitor::new(true);
        let manager = ShiftLifecycleManager::new(
            OperatorProfile::new(EmployeeId::new(employee), "Ana"),
            Arc::clone(store) as Arc<dyn ShiftStore>,
            Arc::new(MemoryCache::new()) as Arc<dyn LocalCache>,
            connectivity.clone(),
            ShiftSettings::default(),
        );
        let pool = crate::db::create_pool(&SecretString::from("postgres://localhost/till_test"))
            .unwrap();

        Harness {
            store: Arc::clone(store),
            connectivity,
            state: AppState::new(pool, Arc::new(manager)),
        }
    }

    async fn send(state: &AppState, request: Request<Body>) -> (StatusCode, Value) {
        let response = router()
            .with_state(state.clone())
            .oneshot(request)
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    fn post(uri: &str, body: &Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_begin_then_state() {
        let h = harness(1);

        let (status, body) = send(
            &h.state,
            post("/api/shifts/begin", &json!({ "opening_cash": "100.00" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["status"], "open");
        assert_eq!(body["employee_id"], 1);

        let (status, body) = send(&h.state, get_req("/api/shifts/state")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "open");
        assert_eq!(body["success"], true);
        assert_eq!(body["is_loading"], false);
    }

    #[tokio::test]
    async fn test_begin_conflict_is_409_with_other_kind() {
        let store = Arc::new(InMemoryShiftStore::new());
        let e1 = harness_with_store(&store, 1);
        let e2 = harness_with_store(&store, 2);

        send(&e1.state, post("/api/shifts/begin", &json!({ "opening_cash": "100" }))).await;
        let (status, body) = send(
            &e2.state,
            post("/api/shifts/begin", &json!({ "opening_cash": "50" })),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "active_shift_exists_other");
        assert_eq!(e2.store.open_shift_count(), 1);
    }

    #[tokio::test]
    async fn test_end_offline_is_503() {
        let h = harness(1);
        h.connectivity.set_online(false);

        let (status, body) = send(
            &h.state,
            post("/api/shifts/end", &json!({ "closing_cash": "0" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "offline_cannot_close");
        assert!(body["message"].as_str().unwrap().contains("offline"));
    }

    #[tokio::test]
    async fn test_end_without_shift_is_409() {
        let h = harness(1);
        let (status, body) = send(
            &h.state,
            post("/api/shifts/end", &json!({ "closing_cash": "0" })),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], "no_active_shift");
    }

    #[tokio::test]
    async fn test_end_returns_recorded_payment_methods() {
        let h = harness(1);
        send(&h.state, post("/api/shifts/begin", &json!({ "opening_cash": "100" }))).await;

        let (status, body) = send(
            &h.state,
            post(
                "/api/shifts/end",
                &json!({
                    "closing_cash": "120",
                    "payment_methods": [
                        { "payment_method": "cash", "amount": "100" },
                        { "payment_method": "card", "amount": "20", "reference": "T-9" }
                    ]
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["shift"]["status"], "closed");
        assert_eq!(body["shift_payment_methods"].as_array().unwrap().len(), 2);
        assert_eq!(h.store.open_shift_count(), 0);
    }

    #[tokio::test]
    async fn test_active_defaults_to_operator() {
        let h = harness(1);
        let (_, body) = send(&h.state, get_req("/api/shifts/active")).await;
        assert!(body["shift"].is_null());
        assert_eq!(body["online"], true);

        send(&h.state, post("/api/shifts/begin", &json!({ "opening_cash": "0" }))).await;
        let (status, body) = send(
            &h.state,
            get_req("/api/shifts/active?employee_id=2&skip_cache=true"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["shift"]["employee_id"], 1);
    }
}
