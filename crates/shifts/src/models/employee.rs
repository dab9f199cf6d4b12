//! Employee (staff record) models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fuel_station_core::{EmployeeId, EmployeeRole};

/// A known staff record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Employee {
    pub id: EmployeeId,
    pub name: String,
    pub email: Option<String>,
    pub role: EmployeeRole,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a staff record.
#[derive(Debug, Clone)]
pub struct NewEmployee {
    /// ID issued by the sign-in system; staff records reuse it.
    pub id: EmployeeId,
    pub name: String,
    pub email: Option<String>,
    pub role: EmployeeRole,
}

/// The signed-in operator of a till.
///
/// Session issuance happens elsewhere; the till receives the profile in its
/// configuration and uses it to synthesize a staff record on first use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorProfile {
    pub employee_id: EmployeeId,
    pub name: String,
    pub email: Option<String>,
    #[serde(default)]
    pub role: EmployeeRole,
}

impl OperatorProfile {
    /// Create a profile for a cashier.
    #[must_use]
    pub fn new(employee_id: EmployeeId, name: impl Into<String>) -> Self {
        Self {
            employee_id,
            name: name.into(),
            email: None,
            role: EmployeeRole::Cashier,
        }
    }

    /// Staff record synthesized from this profile.
    ///
    /// Falls back to the email's local part, then to a generated label, when
    /// the profile carries no display name.
    #[must_use]
    pub fn to_new_employee(&self) -> NewEmployee {
        let name = if self.name.trim().is_empty() {
            self.email
                .as_deref()
                .and_then(|email| email.split('@').next())
                .filter(|local| !local.is_empty())
                .map_or_else(|| format!("Employee {}", self.employee_id), str::to_owned)
        } else {
            self.name.trim().to_owned()
        };

        NewEmployee {
            id: self.employee_id,
            name,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesized_employee_uses_profile_name() {
        let profile = OperatorProfile::new(EmployeeId::new(3), "  Dana  ");
        let employee = profile.to_new_employee();
        assert_eq!(employee.id, EmployeeId::new(3));
        assert_eq!(employee.name, "Dana");
        assert_eq!(employee.role, EmployeeRole::Cashier);
    }

    #[test]
    fn test_synthesized_employee_falls_back_to_email() {
        let mut profile = OperatorProfile::new(EmployeeId::new(3), "");
        profile.email = Some("dana.k@station.example".to_string());
        assert_eq!(profile.to_new_employee().name, "dana.k");
    }

    #[test]
    fn test_synthesized_employee_falls_back_to_id() {
        let profile = OperatorProfile::new(EmployeeId::new(12), " ");
        assert_eq!(profile.to_new_employee().name, "Employee 12");
    }
}
