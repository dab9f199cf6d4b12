//! Shift lifecycle manager.
//!
//! One manager per till. It holds the till's view of the shift state machine
//! (`NoActiveShift -> OpenShift -> Closing -> NoActiveShift`) and enforces
//! the single-open-shift rule from the client side:
//!
//! - `begin` refuses when any open shift is visible (cache while offline,
//!   store while online) and treats a store uniqueness violation as the
//!   final word
//! - `end` only closes the shift this manager holds, and only online
//! - active-shift checks go through [`reconcile`], so the cache is rewritten
//!   from every store answer and read only while offline
//!
//! State sits behind a `std::sync::Mutex` that is never held across an
//! `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use fuel_station_core::{EmployeeId, Money, ShiftId, ShiftStatus};

use super::error::{ShiftError, ShiftOwner};
use super::payments::{PaymentAggregator, declared_total, recorded_total};
use super::reconcile::{CacheWrite, Observation, Resolution, reconcile};
use super::retry::{RetryPolicy, retry_transient};
use crate::cache::{CacheKey, LocalCache};
use crate::connectivity::ConnectivityMonitor;
use crate::models::{CloseShift, NewShift, OperatorProfile, PaymentMethodEntry, Shift, ShiftPaymentMethod};
use crate::store::{ShiftStore, StoreError};

/// Timing knobs for a manager and its background tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShiftSettings {
    /// Sales-total refresh period while a shift is open.
    pub refresh_interval: Duration,
    /// Watchdog tick period.
    pub watchdog_interval: Duration,
    /// Age after which an in-flight check counts as stuck.
    pub stuck_check_timeout: Duration,
    /// Retry policy for the per-employee lookup and payment batch write.
    pub retry: RetryPolicy,
}

impl Default for ShiftSettings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(30),
            watchdog_interval: Duration::from_secs(5),
            stuck_check_timeout: Duration::from_secs(10),
            retry: RetryPolicy::default(),
        }
    }
}

/// Where the held shift is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShiftPhase {
    NoActiveShift,
    OpenShift(Shift),
    Closing(Shift),
}

impl ShiftPhase {
    /// The held shift, open or closing.
    #[must_use]
    pub const fn shift(&self) -> Option<&Shift> {
        match self {
            Self::NoActiveShift => None,
            Self::OpenShift(shift) | Self::Closing(shift) => Some(shift),
        }
    }

    const fn kind(&self) -> PhaseKind {
        match self {
            Self::NoActiveShift => PhaseKind::NoActiveShift,
            Self::OpenShift(_) => PhaseKind::Open,
            Self::Closing(_) => PhaseKind::Closing,
        }
    }
}

/// Serializable name of a [`ShiftPhase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    NoActiveShift,
    Open,
    Closing,
}

/// Read-only state for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct ShiftSnapshot {
    pub phase: PhaseKind,
    pub active_shift: Option<Shift>,
    /// Payment breakdown recorded by the last successful close.
    pub shift_payment_methods: Vec<ShiftPaymentMethod>,
    pub is_loading: bool,
    /// Whether the last `begin`/`end` succeeded.
    pub success: bool,
}

#[derive(Debug, Clone, Copy)]
struct InFlightCheck {
    token: u64,
    started: Instant,
}

#[derive(Debug)]
struct ManagerState {
    phase: ShiftPhase,
    checking: Option<InFlightCheck>,
    next_check_token: u64,
    last_known: Option<Shift>,
    shift_payment_methods: Vec<ShiftPaymentMethod>,
    operations: usize,
    success: bool,
}

impl Default for ManagerState {
    fn default() -> Self {
        Self {
            phase: ShiftPhase::NoActiveShift,
            checking: None,
            next_check_token: 0,
            last_known: None,
            shift_payment_methods: Vec::new(),
            operations: 0,
            success: false,
        }
    }
}

/// Counts a running `begin`/`end` for `is_loading`; released on drop so a
/// cancelled request cannot leave the till loading forever.
struct Busy<'a> {
    state: &'a Mutex<ManagerState>,
}

impl<'a> Busy<'a> {
    fn enter(state: &'a Mutex<ManagerState>) -> Self {
        let mut guard = lock(state);
        guard.operations += 1;
        guard.success = false;
        drop(guard);
        Self { state }
    }

    fn finish(self, success: bool) {
        lock(self.state).success = success;
    }
}

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        let mut guard = lock(self.state);
        guard.operations = guard.operations.saturating_sub(1);
    }
}

fn lock(state: &Mutex<ManagerState>) -> MutexGuard<'_, ManagerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives one till's shift state machine.
pub struct ShiftLifecycleManager {
    operator: OperatorProfile,
    store: Arc<dyn ShiftStore>,
    cache: Arc<dyn LocalCache>,
    connectivity: ConnectivityMonitor,
    payments: PaymentAggregator,
    settings: ShiftSettings,
    state: Mutex<ManagerState>,
}

impl ShiftLifecycleManager {
    /// Create a manager for the signed-in `operator`.
    #[must_use]
    pub fn new(
        operator: OperatorProfile,
        store: Arc<dyn ShiftStore>,
        cache: Arc<dyn LocalCache>,
        connectivity: ConnectivityMonitor,
        settings: ShiftSettings,
    ) -> Self {
        Self {
            payments: PaymentAggregator::new(Arc::clone(&store)),
            operator,
            store,
            cache,
            connectivity,
            settings,
            state: Mutex::new(ManagerState::default()),
        }
    }

    #[must_use]
    pub const fn operator(&self) -> &OperatorProfile {
        &self.operator
    }

    #[must_use]
    pub const fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    #[must_use]
    pub const fn settings(&self) -> &ShiftSettings {
        &self.settings
    }

    /// The open shift this manager holds, if any.
    #[must_use]
    pub fn active_shift(&self) -> Option<Shift> {
        match &self.lock().phase {
            ShiftPhase::OpenShift(shift) => Some(shift.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> ShiftPhase {
        self.lock().phase.clone()
    }

    /// Derived state for the UI.
    #[must_use]
    pub fn snapshot(&self) -> ShiftSnapshot {
        let state = self.lock();
        ShiftSnapshot {
            phase: state.phase.kind(),
            active_shift: state.phase.shift().cloned(),
            shift_payment_methods: state.shift_payment_methods.clone(),
            is_loading: state.operations > 0 || state.checking.is_some(),
            success: state.success,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        lock(&self.state)
    }

    // =========================================================================
    // Active-shift discovery
    // =========================================================================

    /// Find the open shift as seen by `employee_id`.
    ///
    /// While another check is in flight and `skip_cache` is false, returns
    /// the last known value without touching the store. Errors are logged
    /// and reported as `None`.
    #[instrument(skip(self), fields(employee_id = %employee_id))]
    pub async fn check_active_shift(
        &self,
        employee_id: EmployeeId,
        skip_cache: bool,
    ) -> Option<Shift> {
        if !skip_cache {
            let state = self.lock();
            if state.checking.is_some() {
                debug!("Active-shift check already in flight, returning last known value");
                return state.last_known.clone();
            }
        }

        match self.run_check(employee_id).await {
            Ok(resolution) => resolution.shift,
            Err(e) => {
                warn!(error = %e, "Active-shift check failed");
                None
            }
        }
    }

    /// One tracked check. Marks the manager as checking for the duration;
    /// only this call's own mark is cleared, so a check abandoned by the
    /// watchdog cannot clear a newer one when it finally returns.
    async fn run_check(&self, employee_id: EmployeeId) -> Result<Resolution, StoreError> {
        let token = {
            let mut state = self.lock();
            state.next_check_token += 1;
            let token = state.next_check_token;
            state.checking = Some(InFlightCheck {
                token,
                started: Instant::now(),
            });
            token
        };

        let result = self.query_active_shift(employee_id).await;

        let mut state = self.lock();
        if state.checking.is_some_and(|c| c.token == token) {
            state.checking = None;
        }
        if let Ok(resolution) = &result {
            state.last_known.clone_from(&resolution.shift);
        }
        result
    }

    /// The returned resolution is authoritative only when it speaks for the
    /// whole station. A failed station-wide query falls back to the
    /// employee's own shift, which cannot rule out someone else's.
    async fn query_active_shift(&self, employee_id: EmployeeId) -> Result<Resolution, StoreError> {
        if !self.connectivity.is_online() {
            let cached = self.cache.get(&CacheKey::Employee(employee_id)).await;
            let resolution = reconcile(employee_id, Observation::Cache(cached));
            debug!(found = resolution.shift.is_some(), "Offline, answered from local cache");
            return Ok(resolution);
        }

        let (system_wide, answered) = match self.store.find_open_shift().await {
            Ok(found) => (found, true),
            Err(e) => {
                warn!(error = %e, "System-wide open-shift query failed, falling back to per-employee lookup");
                (None, false)
            }
        };

        let found = match system_wide {
            Some(shift) => Some(shift),
            None => {
                retry_transient(self.settings.retry, "find_open_shift_for_employee", || {
                    self.store.find_open_shift_for_employee(employee_id)
                })
                .await?
            }
        };

        let observation = if answered {
            Observation::Store(found)
        } else {
            Observation::Employee(found)
        };
        let resolution = reconcile(employee_id, observation);
        self.apply_cache_writes(resolution.writes.clone()).await;
        self.adopt(employee_id, resolution.shift.as_ref());
        Ok(resolution)
    }

    /// Align the held handle with an authoritative answer.
    fn adopt(&self, employee_id: EmployeeId, open: Option<&Shift>) {
        let me = self.operator.employee_id;
        let mut state = self.lock();

        if matches!(state.phase, ShiftPhase::Closing(_)) {
            return;
        }

        match open {
            Some(shift) if shift.is_owned_by(me) => {
                if state.phase.shift().is_none_or(|held| held.id != shift.id) {
                    info!(shift_id = %shift.id, "Adopted open shift from store");
                }
                state.phase = ShiftPhase::OpenShift(shift.clone());
            }
            // Someone else's shift is open, so ours cannot be.
            Some(_) => drop_handle(&mut state),
            None if employee_id == me => drop_handle(&mut state),
            None => {}
        }
    }

    async fn apply_cache_writes(&self, writes: Vec<CacheWrite>) {
        for write in writes {
            let result = match &write {
                CacheWrite::Set(key, shift) => self.cache.set(key, shift).await,
                CacheWrite::Clear(key) => self.cache.clear(key).await,
            };
            if let Err(e) = result {
                warn!(error = %e, ?write, "Failed to update local shift cache");
            }
        }
    }

    // =========================================================================
    // Begin
    // =========================================================================

    /// Open a new shift owned by the operator.
    ///
    /// `employee_ids` rosters additional staff; the operator is always first.
    ///
    /// Offline, the existence check answers from the local cache, but the
    /// staff record lookup and the insert still go to the store. The lookup
    /// is tried once without backoff so an unreachable store fails fast.
    ///
    /// # Errors
    ///
    /// - [`ShiftError::ActiveShiftExists`] if any open shift is visible or the
    ///   store rejects a second open shift
    /// - [`ShiftError::ExistenceUnverified`] if the existence check failed and
    ///   the re-check could not rule out a shift held by another employee
    /// - [`ShiftError::Store`] for other store failures
    #[instrument(skip(self), fields(employee_id = %self.operator.employee_id))]
    pub async fn begin(
        &self,
        opening_cash: Money,
        employee_ids: Option<Vec<EmployeeId>>,
    ) -> Result<Shift, ShiftError> {
        let busy = Busy::enter(&self.state);
        let result = self.try_begin(opening_cash, employee_ids).await;
        busy.finish(result.is_ok());
        result
    }

    async fn try_begin(
        &self,
        opening_cash: Money,
        employee_ids: Option<Vec<EmployeeId>>,
    ) -> Result<Shift, ShiftError> {
        if opening_cash.is_negative() {
            return Err(ShiftError::InvalidAmount(
                "opening cash cannot be negative".to_string(),
            ));
        }

        let me = self.operator.employee_id;
        if let Some(held) = self.lock().phase.shift() {
            return Err(ShiftError::ActiveShiftExists {
                owner: ShiftOwner::Caller,
                shift_id: Some(held.id),
            });
        }

        let policy = if self.connectivity.is_online() {
            self.settings.retry
        } else {
            RetryPolicy {
                max_attempts: 1,
                ..self.settings.retry
            }
        };

        self.ensure_no_open_shift().await?;
        self.ensure_employee(policy).await?;

        let new = NewShift {
            employee_id: me,
            opening_cash,
            staff_ids: roster(me, employee_ids.unwrap_or_default()),
            start_time: Utc::now(),
        };

        let shift = match self.store.insert_shift(new).await {
            Ok(shift) => shift,
            Err(StoreError::Conflict(detail)) => {
                warn!(detail, "Store rejected a second open shift");
                return Err(self.winning_shift_error().await);
            }
            Err(e) => return Err(e.into()),
        };

        {
            let mut state = self.lock();
            state.phase = ShiftPhase::OpenShift(shift.clone());
            state.last_known = Some(shift.clone());
        }
        let resolution = reconcile(me, Observation::Store(Some(shift.clone())));
        self.apply_cache_writes(resolution.writes).await;

        info!(
            shift_id = %shift.id,
            opening_cash = %shift.opening_cash,
            staff = shift.staff_ids.len(),
            "Shift opened"
        );
        Ok(shift)
    }

    async fn ensure_no_open_shift(&self) -> Result<(), ShiftError> {
        let me = self.operator.employee_id;

        if !self.connectivity.is_online() {
            for key in [CacheKey::Employee(me), CacheKey::SystemWide] {
                let cached = self.cache.get(&key).await;
                if let Some(shift) = reconcile(me, Observation::Cache(cached)).shift {
                    debug!(key = %key, shift_id = %shift.id, "Cached open shift blocks begin");
                    return Err(self.exists_error(&shift));
                }
            }
            return Ok(());
        }

        match self.store.find_open_shift().await {
            Ok(Some(shift)) => Err(self.exists_error(&shift)),
            Ok(None) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Open-shift check failed, re-verifying before begin");
                match self.run_check(me).await {
                    Ok(Resolution {
                        shift: Some(shift), ..
                    }) => Err(self.exists_error(&shift)),
                    Ok(resolution) if resolution.authoritative => Ok(()),
                    // Only our own shift was ruled out.
                    Ok(_) => Err(ShiftError::ExistenceUnverified(e)),
                    Err(recheck) => Err(ShiftError::ExistenceUnverified(recheck)),
                }
            }
        }
    }

    /// Create the operator's staff record if the store has none.
    async fn ensure_employee(&self, policy: RetryPolicy) -> Result<(), StoreError> {
        let me = self.operator.employee_id;
        let exists = retry_transient(policy, "employee_exists", || {
            self.store.employee_exists(me)
        })
        .await?;

        if !exists {
            let employee = self.store.insert_employee(self.operator.to_new_employee()).await?;
            info!(employee_id = %employee.id, name = %employee.name, "Synthesized staff record");
        }
        Ok(())
    }

    fn exists_error(&self, shift: &Shift) -> ShiftError {
        let owner = if shift.is_owned_by(self.operator.employee_id) {
            ShiftOwner::Caller
        } else {
            ShiftOwner::OtherEmployee(shift.employee_id)
        };
        ShiftError::ActiveShiftExists {
            owner,
            shift_id: Some(shift.id),
        }
    }

    async fn winning_shift_error(&self) -> ShiftError {
        match self.store.find_open_shift().await {
            Ok(Some(shift)) => self.exists_error(&shift),
            Ok(None) => ShiftError::ActiveShiftExists {
                owner: ShiftOwner::Unidentified,
                shift_id: None,
            },
            Err(e) => {
                warn!(error = %e, "Could not read the open shift after a conflict");
                ShiftError::ActiveShiftExists {
                    owner: ShiftOwner::Unidentified,
                    shift_id: None,
                }
            }
        }
    }

    // =========================================================================
    // End
    // =========================================================================

    /// Close the held shift.
    ///
    /// The sales total is refreshed once more before the close. A payment
    /// breakdown is written as one batch after the shift is closed; if that
    /// write fails the close still stands and the failure is only logged.
    ///
    /// # Errors
    ///
    /// - [`ShiftError::OfflineCannotClose`] while offline, checked first
    /// - [`ShiftError::NoActiveShift`] if no open shift is held
    /// - [`ShiftError::Store`] if the close itself fails; the shift stays held
    #[instrument(skip(self, payment_methods), fields(employee_id = %self.operator.employee_id))]
    pub async fn end(
        &self,
        closing_cash: Money,
        payment_methods: Option<Vec<PaymentMethodEntry>>,
    ) -> Result<Shift, ShiftError> {
        let busy = Busy::enter(&self.state);
        let result = self.try_end(closing_cash, payment_methods).await;
        busy.finish(result.is_ok());
        result
    }

    async fn try_end(
        &self,
        closing_cash: Money,
        payment_methods: Option<Vec<PaymentMethodEntry>>,
    ) -> Result<Shift, ShiftError> {
        if !self.connectivity.is_online() {
            return Err(ShiftError::OfflineCannotClose);
        }

        let shift = {
            let mut state = self.lock();
            let shift = match &state.phase {
                ShiftPhase::NoActiveShift => return Err(ShiftError::NoActiveShift),
                ShiftPhase::Closing(_) => return Err(ShiftError::CloseInProgress),
                ShiftPhase::OpenShift(shift) => shift.clone(),
            };
            validate_close(closing_cash, payment_methods.as_deref())?;
            state.phase = ShiftPhase::Closing(shift.clone());
            shift
        };

        match self.close_held(&shift, closing_cash, payment_methods).await {
            Ok(closed) => Ok(closed),
            Err(e) => {
                let mut state = self.lock();
                if matches!(&state.phase, ShiftPhase::Closing(s) if s.id == shift.id) {
                    state.phase = ShiftPhase::OpenShift(shift);
                }
                Err(e)
            }
        }
    }

    async fn close_held(
        &self,
        shift: &Shift,
        closing_cash: Money,
        payment_methods: Option<Vec<PaymentMethodEntry>>,
    ) -> Result<Shift, ShiftError> {
        let sales_total = match self.payments.refresh_total(shift.id).await {
            Ok(total) => total,
            Err(e) => {
                warn!(
                    shift_id = %shift.id,
                    error = %e,
                    last_known = %shift.sales_total,
                    "Sales total refresh failed before close, using last known total"
                );
                shift.sales_total
            }
        };

        let close = CloseShift {
            closing_cash,
            sales_total,
            end_time: Utc::now(),
        };

        // A shift already closed with different cash was closed by another
        // till, and its payment batch belongs to that close.
        let (closed, ours) = match self.store.close_shift(shift.id, close).await {
            Ok(closed) => (closed, true),
            Err(StoreError::NotOpen(id)) => {
                let existing = self.store.get_shift(id).await?.ok_or(StoreError::NotFound)?;
                let ours = existing.closing_cash == Some(closing_cash);
                if ours {
                    info!(shift_id = %id, "Shift already closed in store, finishing close");
                } else {
                    warn!(
                        shift_id = %id,
                        stored_closing_cash = ?existing.closing_cash,
                        closing_cash = %closing_cash,
                        "Shift was closed elsewhere, keeping its payment breakdown"
                    );
                }
                (existing, ours)
            }
            Err(e) => return Err(e.into()),
        };
        debug_assert_eq!(closed.status, ShiftStatus::Closed);

        let recorded = match payment_methods {
            Some(entries) if ours && !entries.is_empty() => {
                self.record_payment_methods(closed.id, &entries).await
            }
            _ => Vec::new(),
        };

        let resolution = reconcile(self.operator.employee_id, Observation::Store(Some(closed.clone())));
        self.apply_cache_writes(resolution.writes).await;

        {
            let mut state = self.lock();
            state.phase = ShiftPhase::NoActiveShift;
            state.last_known = None;
            state.shift_payment_methods = recorded;
        }

        info!(
            shift_id = %closed.id,
            sales_total = %closed.sales_total,
            closing_cash = %closing_cash,
            expected_cash = %closed.expected_cash(),
            "Shift closed"
        );
        Ok(closed)
    }

    /// Write the payment batch. Failure leaves the shift closed and is logged
    /// for manual re-entry.
    async fn record_payment_methods(
        &self,
        shift_id: ShiftId,
        entries: &[PaymentMethodEntry],
    ) -> Vec<ShiftPaymentMethod> {
        let result = retry_transient(self.settings.retry, "replace_payment_methods", || {
            self.store.replace_payment_methods(shift_id, entries)
        })
        .await;

        match result {
            Ok(recorded) => {
                debug!(
                    shift_id = %shift_id,
                    methods = recorded.len(),
                    total = %recorded_total(&recorded),
                    "Recorded payment breakdown"
                );
                recorded
            }
            Err(source) => {
                let failure = ShiftError::PartialCloseFailure { shift_id, source };
                warn!(
                    error = %failure,
                    declared_total = %declared_total(entries),
                    methods = entries.len(),
                    "Payment breakdown not recorded for closed shift"
                );
                Vec::new()
            }
        }
    }

    // =========================================================================
    // Periodic work
    // =========================================================================

    /// Recompute the held shift's running sales total.
    ///
    /// Returns the new total, or `None` when no shift is open or the refresh
    /// failed (the previous total is kept).
    pub async fn refresh_sales_total(&self) -> Option<Money> {
        let shift_id = match &self.lock().phase {
            ShiftPhase::OpenShift(shift) => shift.id,
            _ => return None,
        };

        match self.payments.refresh_total(shift_id).await {
            Ok(total) => {
                let mut state = self.lock();
                if let ShiftPhase::OpenShift(shift) = &mut state.phase {
                    if shift.id == shift_id {
                        shift.sales_total = total;
                    }
                }
                Some(total)
            }
            Err(e) => {
                warn!(shift_id = %shift_id, error = %e, "Sales total refresh failed, keeping previous total");
                None
            }
        }
    }

    /// Clear the in-flight check mark if it is older than the stuck-check
    /// timeout. Returns `true` if it was cleared.
    pub fn watchdog_tick(&self) -> bool {
        let mut state = self.lock();
        let Some(check) = state.checking else {
            return false;
        };

        let age = check.started.elapsed();
        if age < self.settings.stuck_check_timeout {
            return false;
        }

        warn!(
            stuck_ms = u64::try_from(age.as_millis()).unwrap_or(u64::MAX),
            "Active-shift check stuck, clearing in-flight flag"
        );
        state.checking = None;
        true
    }
}

fn drop_handle(state: &mut ManagerState) {
    if let ShiftPhase::OpenShift(held) = &state.phase {
        info!(shift_id = %held.id, "Held shift is no longer open in store, dropping handle");
        state.phase = ShiftPhase::NoActiveShift;
    }
}

/// Owner first, then the requested staff without duplicates.
fn roster(owner: EmployeeId, requested: Vec<EmployeeId>) -> Vec<EmployeeId> {
    let mut staff = vec![owner];
    for id in requested {
        if !staff.contains(&id) {
            staff.push(id);
        }
    }
    staff
}

fn validate_close(
    closing_cash: Money,
    payment_methods: Option<&[PaymentMethodEntry]>,
) -> Result<(), ShiftError> {
    if closing_cash.is_negative() {
        return Err(ShiftError::InvalidAmount(
            "closing cash cannot be negative".to_string(),
        ));
    }
    if let Some(entry) = payment_methods
        .unwrap_or_default()
        .iter()
        .find(|e| e.amount.is_negative())
    {
        return Err(ShiftError::InvalidAmount(format!(
            "{} amount cannot be negative",
            entry.payment_method
        )));
    }
    Ok(())
}
