//! Shift domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fuel_station_core::{
    EmployeeId, Money, PaymentMethod, ShiftId, ShiftPaymentMethodId, ShiftStatus,
};

/// A cash-drawer / staffing session.
///
/// At most one shift may be `Open` across the whole system at any instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shift {
    /// Unique shift ID.
    pub id: ShiftId,
    /// Employee who opened (and owns) the shift.
    pub employee_id: EmployeeId,
    /// Lifecycle status.
    pub status: ShiftStatus,
    /// Cash in the drawer when the shift opened.
    pub opening_cash: Money,
    /// Cash counted at close. `None` while open.
    pub closing_cash: Option<Money>,
    /// Sum of sales tagged with this shift.
    pub sales_total: Money,
    /// Employees rostered on the shift (owner first).
    pub staff_ids: Vec<EmployeeId>,
    /// When the shift opened.
    pub start_time: DateTime<Utc>,
    /// When the shift closed.
    pub end_time: Option<DateTime<Utc>>,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Shift {
    /// Whether the shift is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.status == ShiftStatus::Open
    }

    /// Whether `employee_id` owns this shift.
    #[must_use]
    pub fn is_owned_by(&self, employee_id: EmployeeId) -> bool {
        self.employee_id == employee_id
    }

    /// Cash expected in the drawer at close: opening float plus sales.
    #[must_use]
    pub fn expected_cash(&self) -> Money {
        self.opening_cash + self.sales_total
    }
}

/// Input for opening a new shift.
#[derive(Debug, Clone)]
pub struct NewShift {
    pub employee_id: EmployeeId,
    pub opening_cash: Money,
    pub staff_ids: Vec<EmployeeId>,
    pub start_time: DateTime<Utc>,
}

/// Values written when a shift closes.
#[derive(Debug, Clone, Copy)]
pub struct CloseShift {
    pub closing_cash: Money,
    /// Final sales total, reconciled just before close.
    pub sales_total: Money,
    pub end_time: DateTime<Utc>,
}

/// A recorded payment-method amount for a closed shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftPaymentMethod {
    /// Unique record ID.
    pub id: ShiftPaymentMethodId,
    /// Shift the amount belongs to.
    pub shift_id: ShiftId,
    /// How the amount was received.
    pub payment_method: PaymentMethod,
    /// Amount received.
    pub amount: Money,
    /// Optional external reference (terminal batch number, transfer id).
    pub reference: Option<String>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}

/// One line of the payment breakdown supplied when closing a shift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethodEntry {
    pub payment_method: PaymentMethod,
    pub amount: Money,
    #[serde(default)]
    pub reference: Option<String>,
}

impl PaymentMethodEntry {
    /// Convenience constructor without a reference.
    #[must_use]
    pub const fn new(payment_method: PaymentMethod, amount: Money) -> Self {
        Self {
            payment_method,
            amount,
            reference: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_shift() -> Shift {
        let now = Utc::now();
        Shift {
            id: ShiftId::new(1),
            employee_id: EmployeeId::new(7),
            status: ShiftStatus::Open,
            opening_cash: Money::from_minor(10_000),
            closing_cash: None,
            sales_total: Money::from_minor(2_550),
            staff_ids: vec![EmployeeId::new(7)],
            start_time: now,
            end_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_expected_cash_adds_sales_to_float() {
        assert_eq!(open_shift().expected_cash(), Money::from_minor(12_550));
    }

    #[test]
    fn test_ownership() {
        let shift = open_shift();
        assert!(shift.is_open());
        assert!(shift.is_owned_by(EmployeeId::new(7)));
        assert!(!shift.is_owned_by(EmployeeId::new(8)));
    }

    #[test]
    fn test_payment_entry_reference_is_optional_in_json() {
        let entry: PaymentMethodEntry =
            serde_json::from_str(r#"{"payment_method":"cash","amount":"120.00"}"#).unwrap();
        assert_eq!(
            entry,
            PaymentMethodEntry::new(PaymentMethod::Cash, Money::from_minor(12_000))
        );
    }
}
