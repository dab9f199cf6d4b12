//! `PostgreSQL` implementation of [`ShiftStore`].
//!
//! Queries are built at runtime (`query_as::<_, Row>`) so the crate builds
//! without a live database or an offline query cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use fuel_station_core::{
    EmployeeId, EmployeeRole, Money, PaymentMethod, ShiftId, ShiftPaymentMethodId, ShiftStatus,
};

use crate::models::{
    CloseShift, Employee, NewEmployee, NewShift, PaymentMethodEntry, Shift, ShiftPaymentMethod,
};
use crate::store::{ShiftStore, StoreError};

const SHIFT_COLUMNS: &str = "id, employee_id, status, opening_cash, closing_cash, sales_total, \
     staff_ids, start_time, end_time, created_at, updated_at";

const PAYMENT_METHOD_COLUMNS: &str =
    "id, shift_id, payment_method, amount, reference, created_at";

const EMPLOYEE_COLUMNS: &str = "id, name, email, role, created_at";

// =============================================================================
// Internal Row Types
// =============================================================================

/// Internal row type for shift queries.
#[derive(Debug, sqlx::FromRow)]
struct ShiftRow {
    id: i32,
    employee_id: i32,
    status: ShiftStatus,
    opening_cash: Decimal,
    closing_cash: Option<Decimal>,
    sales_total: Decimal,
    staff_ids: Vec<i32>,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ShiftRow> for Shift {
    fn from(row: ShiftRow) -> Self {
        Self {
            id: ShiftId::new(row.id),
            employee_id: EmployeeId::new(row.employee_id),
            status: row.status,
            opening_cash: Money::new(row.opening_cash),
            closing_cash: row.closing_cash.map(Money::new),
            sales_total: Money::new(row.sales_total),
            staff_ids: row.staff_ids.into_iter().map(EmployeeId::new).collect(),
            start_time: row.start_time,
            end_time: row.end_time,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Internal row type for payment-method queries.
#[derive(Debug, sqlx::FromRow)]
struct ShiftPaymentMethodRow {
    id: i32,
    shift_id: i32,
    payment_method: PaymentMethod,
    amount: Decimal,
    reference: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ShiftPaymentMethodRow> for ShiftPaymentMethod {
    fn from(row: ShiftPaymentMethodRow) -> Self {
        Self {
            id: ShiftPaymentMethodId::new(row.id),
            shift_id: ShiftId::new(row.shift_id),
            payment_method: row.payment_method,
            amount: Money::new(row.amount),
            reference: row.reference,
            created_at: row.created_at,
        }
    }
}

/// Internal row type for employee queries.
#[derive(Debug, sqlx::FromRow)]
struct EmployeeRow {
    id: i32,
    name: String,
    email: Option<String>,
    role: EmployeeRole,
    created_at: DateTime<Utc>,
}

impl From<EmployeeRow> for Employee {
    fn from(row: EmployeeRow) -> Self {
        Self {
            id: EmployeeId::new(row.id),
            name: row.name,
            email: row.email,
            role: row.role,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Shift store backed by the back office database.
#[derive(Clone)]
pub struct PgShiftStore {
    pool: PgPool,
}

impl PgShiftStore {
    /// Create a new store over a pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl ShiftStore for PgShiftStore {
    async fn find_open_shift(&self) -> Result<Option<Shift>, StoreError> {
        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE status = 'open' \
             ORDER BY start_time LIMIT 1"
        ))
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_open_shift_for_employee(
        &self,
        employee_id: EmployeeId,
    ) -> Result<Option<Shift>, StoreError> {
        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE status = 'open' AND employee_id = $1 \
             ORDER BY start_time DESC LIMIT 1"
        ))
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn get_shift(&self, id: ShiftId) -> Result<Option<Shift>, StoreError> {
        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM shifts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn insert_shift(&self, new: NewShift) -> Result<Shift, StoreError> {
        let staff_ids: Vec<i32> = new.staff_ids.iter().map(EmployeeId::as_i32).collect();

        // A unique violation on shifts_single_open_idx surfaces as Conflict.
        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            "INSERT INTO shifts (employee_id, status, opening_cash, sales_total, staff_ids, start_time) \
             VALUES ($1, 'open', $2, 0, $3, $4) \
             RETURNING {SHIFT_COLUMNS}"
        ))
        .bind(new.employee_id)
        .bind(new.opening_cash)
        .bind(staff_ids)
        .bind(new.start_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn close_shift(&self, id: ShiftId, close: CloseShift) -> Result<Shift, StoreError> {
        let row = sqlx::query_as::<_, ShiftRow>(&format!(
            "UPDATE shifts \
             SET status = 'closed', closing_cash = $2, sales_total = $3, end_time = $4, \
                 updated_at = NOW() \
             WHERE id = $1 AND status = 'open' \
             RETURNING {SHIFT_COLUMNS}"
        ))
        .bind(id)
        .bind(close.closing_cash)
        .bind(close.sales_total)
        .bind(close.end_time)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(row.into());
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shifts WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        if exists {
            Err(StoreError::NotOpen(id))
        } else {
            Err(StoreError::NotFound)
        }
    }

    async fn replace_payment_methods(
        &self,
        shift_id: ShiftId,
        entries: &[PaymentMethodEntry],
    ) -> Result<Vec<ShiftPaymentMethod>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let status: Option<ShiftStatus> =
            sqlx::query_scalar("SELECT status FROM shifts WHERE id = $1 FOR UPDATE")
                .bind(shift_id)
                .fetch_optional(&mut *tx)
                .await?;

        match status {
            None => return Err(StoreError::NotFound),
            Some(ShiftStatus::Open) => {
                return Err(StoreError::Conflict(format!(
                    "payment methods can only be recorded for a closed shift ({shift_id})"
                )));
            }
            Some(ShiftStatus::Closed) => {}
        }

        sqlx::query("DELETE FROM shift_payment_methods WHERE shift_id = $1")
            .bind(shift_id)
            .execute(&mut *tx)
            .await?;

        let mut recorded = Vec::with_capacity(entries.len());
        for entry in entries {
            let row = sqlx::query_as::<_, ShiftPaymentMethodRow>(&format!(
                "INSERT INTO shift_payment_methods (shift_id, payment_method, amount, reference) \
                 VALUES ($1, $2, $3, $4) \
                 RETURNING {PAYMENT_METHOD_COLUMNS}"
            ))
            .bind(shift_id)
            .bind(entry.payment_method)
            .bind(entry.amount)
            .bind(entry.reference.as_deref())
            .fetch_one(&mut *tx)
            .await?;
            recorded.push(row.into());
        }

        tx.commit().await?;
        Ok(recorded)
    }

    async fn payment_methods(
        &self,
        shift_id: ShiftId,
    ) -> Result<Vec<ShiftPaymentMethod>, StoreError> {
        let rows = sqlx::query_as::<_, ShiftPaymentMethodRow>(&format!(
            "SELECT {PAYMENT_METHOD_COLUMNS} FROM shift_payment_methods \
             WHERE shift_id = $1 ORDER BY id"
        ))
        .bind(shift_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn sale_amounts(&self, shift_id: ShiftId) -> Result<Vec<Option<Money>>, StoreError> {
        let amounts: Vec<Option<Decimal>> =
            sqlx::query_scalar("SELECT amount FROM sales WHERE shift_id = $1")
                .bind(shift_id)
                .fetch_all(&self.pool)
                .await?;

        Ok(amounts.into_iter().map(|a| a.map(Money::new)).collect())
    }

    async fn employee_exists(&self, id: EmployeeId) -> Result<bool, StoreError> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM employees WHERE id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn insert_employee(&self, new: NewEmployee) -> Result<Employee, StoreError> {
        let inserted = sqlx::query_as::<_, EmployeeRow>(&format!(
            "INSERT INTO employees (id, name, email, role) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO NOTHING \
             RETURNING {EMPLOYEE_COLUMNS}"
        ))
        .bind(new.id)
        .bind(&new.name)
        .bind(new.email.as_deref())
        .bind(new.role)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(row.into());
        }

        let existing = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1"
        ))
        .bind(new.id)
        .fetch_one(&self.pool)
        .await?;

        Ok(existing.into())
    }
}
