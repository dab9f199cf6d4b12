//! In-process shift store.
//!
//! Mirrors the `PostgreSQL` schema's rules, including the partial unique
//! index that allows a single open shift, so several lifecycle managers
//! sharing one instance behave like tills sharing the back office database.
//!
//! Faults can be queued per operation to exercise retry, fallback and
//! watchdog paths without a live database.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use fuel_station_core::{EmployeeId, Money, ShiftId, ShiftPaymentMethodId, ShiftStatus};

use super::{ShiftStore, StoreError};
use crate::models::{
    CloseShift, Employee, NewEmployee, NewShift, PaymentMethodEntry, Shift, ShiftPaymentMethod,
};

/// Store operations that faults can be attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOperation {
    FindOpenShift,
    FindOpenShiftForEmployee,
    GetShift,
    InsertShift,
    CloseShift,
    ReplacePaymentMethods,
    PaymentMethods,
    SaleAmounts,
    EmployeeExists,
    InsertEmployee,
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Unavailable,
    Stall,
}

#[derive(Default)]
struct Inner {
    shifts: BTreeMap<ShiftId, Shift>,
    payment_methods: Vec<ShiftPaymentMethod>,
    sales: Vec<(ShiftId, Option<Money>)>,
    employees: BTreeMap<EmployeeId, Employee>,
    next_shift_id: i32,
    next_payment_method_id: i32,
    faults: HashMap<StoreOperation, VecDeque<Fault>>,
    calls: HashMap<StoreOperation, usize>,
}

/// Shift store held entirely in memory.
#[derive(Default)]
pub struct InMemoryShiftStore {
    inner: Mutex<Inner>,
}

impl InMemoryShiftStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `times` calls of `operation` fail as unreachable.
    pub fn fail_next(&self, operation: StoreOperation, times: usize) {
        let mut inner = self.lock();
        let queue = inner.faults.entry(operation).or_default();
        queue.extend(std::iter::repeat_n(Fault::Unavailable, times));
    }

    /// Make the next call of `operation` hang forever, like a request lost
    /// on a dead connection.
    pub fn stall_next(&self, operation: StoreOperation) {
        self.lock()
            .faults
            .entry(operation)
            .or_default()
            .push_back(Fault::Stall);
    }

    /// How many times `operation` has been called, faults included.
    #[must_use]
    pub fn calls(&self, operation: StoreOperation) -> usize {
        self.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Record a sale against a shift.
    pub fn record_sale(&self, shift_id: ShiftId, amount: Option<Money>) {
        self.lock().sales.push((shift_id, amount));
    }

    /// Snapshot of every shift, ordered by id.
    #[must_use]
    pub fn shifts(&self) -> Vec<Shift> {
        self.lock().shifts.values().cloned().collect()
    }

    /// Number of shifts currently open.
    #[must_use]
    pub fn open_shift_count(&self) -> usize {
        self.lock().shifts.values().filter(|s| s.is_open()).count()
    }

    /// Add a staff record directly.
    pub fn seed_employee(&self, new: NewEmployee) {
        let employee = to_employee(new);
        self.lock().employees.insert(employee.id, employee);
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and apply any queued fault.
    async fn enter(&self, operation: StoreOperation) -> Result<(), StoreError> {
        let fault = {
            let mut inner = self.lock();
            *inner.calls.entry(operation).or_default() += 1;
            inner
                .faults
                .get_mut(&operation)
                .and_then(VecDeque::pop_front)
        };

        match fault {
            None => Ok(()),
            Some(Fault::Unavailable) => {
                debug!(?operation, "Injected store outage");
                Err(StoreError::Unavailable(format!(
                    "injected failure for {operation:?}"
                )))
            }
            Some(Fault::Stall) => {
                debug!(?operation, "Injected store stall");
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }
}

fn to_employee(new: NewEmployee) -> Employee {
    Employee {
        id: new.id,
        name: new.name,
        email: new.email,
        role: new.role,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl ShiftStore for InMemoryShiftStore {
    async fn find_open_shift(&self) -> Result<Option<Shift>, StoreError> {
        self.enter(StoreOperation::FindOpenShift).await?;
        Ok(self.lock().shifts.values().find(|s| s.is_open()).cloned())
    }

    async fn find_open_shift_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Option<Shift>, StoreError> {
        self.enter(StoreOperation::FindOpenShiftForEmployee).await?;
        Ok(self
            .lock()
            .shifts
            .values()
            .find(|s| s.is_open() && s.is_owned_by(employee_id))
            .cloned())
    }

    async fn get_shift(&self, id: ShiftId) -> Result<Option<Shift>, StoreError> {
        self.enter(StoreOperation::GetShift).await?;
        Ok(self.lock().shifts.get(&id).cloned())
    }

    async fn insert_shift(&self, new: NewShift) -> Result<Shift, StoreError> {
        self.enter(StoreOperation::InsertShift).await?;
        let mut inner = self.lock();

        // Same rule as shifts_single_open_idx
        if inner.shifts.values().any(Shift::is_open) {
            return Err(StoreError::Conflict(
                "duplicate key value violates unique constraint \"shifts_single_open_idx\""
                    .to_string(),
            ));
        }

        inner.next_shift_id += 1;
        let now = Utc::now();
        let shift = Shift {
            id: ShiftId::new(inner.next_shift_id),
            employee_id: new.employee_id,
            status: ShiftStatus::Open,
            opening_cash: new.opening_cash,
            closing_cash: None,
            sales_total: Money::ZERO,
            staff_ids: new.staff_ids,
            start_time: new.start_time,
            end_time: None,
            created_at: now,
            updated_at: now,
        };
        inner.shifts.insert(shift.id, shift.clone());
        Ok(shift)
    }

    async fn close_shift(&self, id: ShiftId, close: CloseShift) -> Result<Shift, StoreError> {
        self.enter(StoreOperation::CloseShift).await?;
        let mut inner = self.lock();
        let shift = inner.shifts.get_mut(&id).ok_or(StoreError::NotFound)?;

        if !shift.status.can_transition_to(ShiftStatus::Closed) {
            return Err(StoreError::NotOpen(id));
        }

        shift.status = ShiftStatus::Closed;
        shift.closing_cash = Some(close.closing_cash);
        shift.sales_total = close.sales_total;
        shift.end_time = Some(close.end_time);
        shift.updated_at = Utc::now();
        Ok(shift.clone())
    }

    async fn replace_payment_methods(
        &self,
        shift_id: ShiftId,
        entries: &[PaymentMethodEntry],
    ) -> Result<Vec<ShiftPaymentMethod>, StoreError> {
        self.enter(StoreOperation::ReplacePaymentMethods).await?;
        let mut inner = self.lock();

        match inner.shifts.get(&shift_id) {
            None => return Err(StoreError::NotFound),
            Some(shift) if shift.is_open() => {
                return Err(StoreError::Conflict(format!(
                    "payment methods can only be recorded for a closed shift ({shift_id})"
                )));
            }
            Some(_) => {}
        }

        inner.payment_methods.retain(|pm| pm.shift_id != shift_id);

        let now = Utc::now();
        let mut recorded = Vec::with_capacity(entries.len());
        for entry in entries {
            inner.next_payment_method_id += 1;
            let record = ShiftPaymentMethod {
                id: ShiftPaymentMethodId::new(inner.next_payment_method_id),
                shift_id,
                payment_method: entry.payment_method,
                amount: entry.amount,
                reference: entry.reference.clone(),
                created_at: now,
            };
            inner.payment_methods.push(record.clone());
            recorded.push(record);
        }
        Ok(recorded)
    }

    async fn payment_methods(
        &self,
        shift_id: ShiftId,
    ) -> Result<Vec<ShiftPaymentMethod>, StoreError> {
        self.enter(StoreOperation::PaymentMethods).await?;
        Ok(self
            .lock()
            .payment_methods
            .iter()
            .filter(|pm| pm.shift_id == shift_id)
            .cloned()
            .collect())
    }

    async fn sale_amounts(&self, shift_id: ShiftId) -> Result<Vec<Option<Money>>, StoreError> {
        self.enter(StoreOperation::SaleAmounts).await?;
        Ok(self
            .lock()
            .sales
            .iter()
            .filter(|(id, _)| *id == shift_id)
            .map(|(_, amount)| *amount)
            .collect())
    }

    async fn employee_exists(&self, id: EmployeeId) -> Result<bool, StoreError> {
        self.enter(StoreOperation::EmployeeExists).await?;
        Ok(self.lock().employees.contains_key(&id))
    }

    async fn insert_employee(&self, new: NewEmployee) -> Result<Employee, StoreError> {
        self.enter(StoreOperation::InsertEmployee).await?;
        let mut inner = self.lock();
        let employee = inner
            .employees
            .entry(new.id)
            .or_insert_with(|| to_employee(new))
            .clone();
        Ok(employee)
    }
}
