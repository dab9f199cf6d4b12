//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::services::ShiftLifecycleManager;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pool: PgPool,
    manager: Arc<ShiftLifecycleManager>,
}

impl AppState {
    /// Create application state around the till's manager.
    #[must_use]
    pub fn new(pool: PgPool, manager: Arc<ShiftLifecycleManager>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { pool, manager }),
        }
    }

    /// Get a reference to the database pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get the till's shift lifecycle manager.
    #[must_use]
    pub fn manager(&self) -> &ShiftLifecycleManager {
        &self.inner.manager
    }
}
