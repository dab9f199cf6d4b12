//! Integration tests for the fuel station shift subsystem.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p fuel-station-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `shift_invariant` - several tills racing on one shared store
//! - `offline_behavior` - cache fallback, offline refusals and reconnect
//!
//! Every till here is a full [`ShiftLifecycleManager`] with its own cache
//! and connectivity signal. They share one [`InMemoryShiftStore`], which
//! enforces the same single-open-shift rule as the `PostgreSQL` schema.

use std::sync::Arc;
use std::time::Duration;

use fuel_station_core::EmployeeId;
use fuel_station_shifts::cache::{LocalCache, MemoryCache};
use fuel_station_shifts::connectivity::ConnectivityMonitor;
use fuel_station_shifts::models::OperatorProfile;
use fuel_station_shifts::services::{RetryPolicy, ShiftLifecycleManager, ShiftSettings};
use fuel_station_shifts::store::{InMemoryShiftStore, ShiftStore};

/// Settings with a short retry delay so failure paths finish quickly on a
/// real clock.
#[must_use]
pub fn fast_settings() -> ShiftSettings {
    ShiftSettings {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
        },
        ..ShiftSettings::default()
    }
}

/// One back office shared by several tills.
#[derive(Clone, Default)]
pub struct Station {
    pub store: Arc<InMemoryShiftStore>,
}

impl Station {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A till signed in as `employee`, online.
    #[must_use]
    pub fn till(&self, employee: i32, name: &str) -> Till {
        self.till_with(employee, name, fast_settings())
    }

    /// A till with explicit settings.
    #[must_use]
    pub fn till_with(&self, employee: i32, name: &str, settings: ShiftSettings) -> Till {
        let cache = Arc::new(MemoryCache::new());
        let connectivity = ConnectivityMonitor::new(true);
        let manager = ShiftLifecycleManager::new(
            OperatorProfile::new(EmployeeId::new(employee), name),
            Arc::clone(&self.store) as Arc<dyn ShiftStore>,
            Arc::clone(&cache) as Arc<dyn LocalCache>,
            connectivity.clone(),
            settings,
        );

        Till {
            manager: Arc::new(manager),
            cache,
            connectivity,
        }
    }
}

/// One point-of-sale terminal.
#[derive(Clone)]
pub struct Till {
    pub manager: Arc<ShiftLifecycleManager>,
    pub cache: Arc<MemoryCache>,
    pub connectivity: ConnectivityMonitor,
}

impl Till {
    #[must_use]
    pub fn employee_id(&self) -> EmployeeId {
        self.manager.operator().employee_id
    }

    /// Refresh this till's view from the store, bypassing in-flight
    /// deduplication.
    pub async fn sync(&self) {
        self.manager
            .check_active_shift(self.employee_id(), true)
            .await;
    }

    pub fn go_offline(&self) {
        self.connectivity.set_online(false);
    }

    pub fn go_online(&self) {
        self.connectivity.set_online(true);
    }
}
