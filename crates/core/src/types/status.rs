//! Status enums for shift-related entities.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a shift.
///
/// The only legal transition is `Open -> Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "shift_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum ShiftStatus {
    Open,
    Closed,
}

impl ShiftStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!((self, next), (Self::Open, Self::Closed))
    }
}

impl std::fmt::Display for ShiftStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// How a portion of a shift's takings was received.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    MobilePayment,
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cash => write!(f, "cash"),
            Self::Card => write!(f, "card"),
            Self::BankTransfer => write!(f, "bank_transfer"),
            Self::MobilePayment => write!(f, "mobile_payment"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(Self::Cash),
            "card" => Ok(Self::Card),
            "bank_transfer" => Ok(Self::BankTransfer),
            "mobile_payment" => Ok(Self::MobilePayment),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Staff role at the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "employee_role", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum EmployeeRole {
    /// Runs a till.
    #[default]
    Cashier,
    /// Oversees tills on a shift.
    Supervisor,
    /// Station manager.
    Manager,
}

impl std::fmt::Display for EmployeeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cashier => write!(f, "cashier"),
            Self::Supervisor => write!(f, "supervisor"),
            Self::Manager => write!(f, "manager"),
        }
    }
}

impl std::str::FromStr for EmployeeRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cashier" => Ok(Self::Cashier),
            "supervisor" => Ok(Self::Supervisor),
            "manager" => Ok(Self::Manager),
            _ => Err(format!("invalid employee role: {s}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_never_reopens() {
        assert!(ShiftStatus::Open.can_transition_to(ShiftStatus::Closed));
        assert!(!ShiftStatus::Closed.can_transition_to(ShiftStatus::Open));
        assert!(!ShiftStatus::Open.can_transition_to(ShiftStatus::Open));
    }

    #[test]
    fn test_payment_method_round_trips_through_str() {
        for method in [
            PaymentMethod::Cash,
            PaymentMethod::Card,
            PaymentMethod::BankTransfer,
            PaymentMethod::MobilePayment,
        ] {
            assert_eq!(method.to_string().parse::<PaymentMethod>(), Ok(method));
        }
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_method_serde_snake_case() {
        let json = serde_json::to_string(&PaymentMethod::BankTransfer).unwrap();
        assert_eq!(json, "\"bank_transfer\"");
    }

    #[test]
    fn test_employee_role_default_is_cashier() {
        assert_eq!(EmployeeRole::default(), EmployeeRole::Cashier);
        assert_eq!("manager".parse::<EmployeeRole>(), Ok(EmployeeRole::Manager));
    }
}
