//! Fuel station till agent.
//!
//! Runs on each point-of-sale terminal next to the browser UI and serves
//! the shift API on a local port (3002 by default).
//!
//! # Architecture
//!
//! - Axum web framework
//! - One `ShiftLifecycleManager` per till, shared by handlers and tasks
//! - `PostgreSQL` back office store (lazy pool, the till boots offline)
//! - JSON file cache of the last known open shift
//! - Background loops: connectivity probe, sales refresh, watchdog, reconnect
//!   reconciliation

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Router, routing::get};
use sentry::integrations::tracing as sentry_tracing;
use tower::ServiceBuilder;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fuel_station_shifts::cache::{FileCache, LocalCache};
use fuel_station_shifts::config::TillConfig;
use fuel_station_shifts::connectivity::ConnectivityMonitor;
use fuel_station_shifts::db::{self, PgShiftStore};
use fuel_station_shifts::routes;
use fuel_station_shifts::services::{
    ShiftLifecycleManager, spawn_reconnect_reconciler, spawn_sales_refresh, spawn_watchdog,
};
use fuel_station_shifts::state::AppState;
use fuel_station_shifts::store::ShiftStore;

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &TillConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            send_default_pii: false,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = TillConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fuel_station_shifts=info,tower_http=debug".into());

    let json_layer = config
        .log_json
        .then(|| tracing_subscriber::fmt::layer().json().flatten_event(true));
    let text_layer = (!config.log_json).then(tracing_subscriber::fmt::layer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(config.operator.employee_id.to_string()),
            ..Default::default()
        }));
    });

    // Connections open on first use; the probe decides online/offline.
    let pool = db::create_pool(&config.database_url).expect("Invalid database URL");
    let connectivity = ConnectivityMonitor::new(false);
    if connectivity.probe(&pool).await {
        tracing::info!("Database reachable");
    } else {
        tracing::warn!("Database unreachable at startup, running offline");
    }

    // NOTE: Migrations are NOT run automatically on startup.
    // Run them explicitly via: cargo run -p fuel-station-cli -- migrate

    let store: Arc<dyn ShiftStore> = Arc::new(PgShiftStore::new(pool.clone()));
    let cache: Arc<dyn LocalCache> = Arc::new(FileCache::new(&config.cache_path));
    let manager = Arc::new(ShiftLifecycleManager::new(
        config.operator.clone(),
        store,
        cache,
        connectivity.clone(),
        config.shifts,
    ));

    // Adopt a shift this operator left open before a restart.
    let existing = manager
        .check_active_shift(config.operator.employee_id, true)
        .await;
    tracing::info!(
        employee_id = %config.operator.employee_id,
        shift_id = ?existing.as_ref().map(|s| s.id),
        "Till ready"
    );

    let tasks = [
        connectivity.spawn_probe(pool.clone(), config.probe_interval),
        spawn_sales_refresh(Arc::clone(&manager)),
        spawn_watchdog(Arc::clone(&manager)),
        spawn_reconnect_reconciler(Arc::clone(&manager)),
    ];

    let state = AppState::new(pool, manager);

    // Build router
    let app = Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(routes::routes())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(
            ServiceBuilder::new()
                .layer(sentry_tower::NewSentryLayer::new_from_top())
                .layer(sentry_tower::SentryHttpLayer::new().enable_transaction()),
        );

    // NOTE: Binding to 127.0.0.1 - only the till's own browser calls this API
    let addr = config.socket_addr();
    tracing::info!("till agent listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    for task in tasks {
        task.abort();
    }
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Verifies database connectivity before returning OK.
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
