//! Staff record commands.
//!
//! # Usage
//!
//! ```bash
//! fs-cli employee create --id 12 -n "Ana Silva" -e ana@station.example -r supervisor
//! ```
//!
//! # Environment Variables
//!
//! - `FUEL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use fuel_station_core::{EmployeeId, EmployeeRole};
use fuel_station_shifts::config::{ConfigError, get_database_url};
use fuel_station_shifts::db::PgShiftStore;
use fuel_station_shifts::models::NewEmployee;
use fuel_station_shifts::store::{ShiftStore, StoreError};

/// Errors that can occur during employee operations.
#[derive(Debug, Error)]
pub enum EmployeeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// Invalid role.
    #[error("Invalid role: {0}. Valid roles: cashier, supervisor, manager")]
    InvalidRole(String),

    /// Invalid email.
    #[error("Invalid email: {0}")]
    InvalidEmail(String),

    #[error("Employee name must not be empty")]
    EmptyName,
}

/// Create a staff record.
///
/// An existing record with the same id is left untouched and returned.
pub async fn create(
    id: EmployeeId,
    name: &str,
    email: Option<&str>,
    role: &str,
) -> Result<EmployeeId, EmployeeError> {
    dotenvy::dotenv().ok();

    let new = validate(id, name, email, role)?;

    let database_url = get_database_url("FUEL_DATABASE_URL")?;

    tracing::info!("Connecting to back office database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;
    let store = PgShiftStore::new(pool);

    tracing::info!("Creating employee: {} ({})", new.name, new.role);
    let employee = store.insert_employee(new).await?;

    tracing::info!(
        "Employee ready! ID: {}, Name: {}, Role: {}",
        employee.id,
        employee.name,
        employee.role
    );
    if employee.name != name.trim() {
        tracing::warn!("An employee with this id already existed and was not modified.");
    }

    Ok(employee.id)
}

fn validate(
    id: EmployeeId,
    name: &str,
    email: Option<&str>,
    role: &str,
) -> Result<NewEmployee, EmployeeError> {
    let role: EmployeeRole = role
        .parse()
        .map_err(|_| EmployeeError::InvalidRole(role.to_owned()))?;

    let name = name.trim();
    if name.is_empty() {
        return Err(EmployeeError::EmptyName);
    }

    // Basic email validation
    if let Some(email) = email {
        if !email.contains('@') || !email.contains('.') {
            return Err(EmployeeError::InvalidEmail(email.to_owned()));
        }
    }

    Ok(NewEmployee {
        id,
        name: name.to_owned(),
        email: email.map(str::to_owned),
        role,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_known_roles() {
        let new = validate(EmployeeId::new(3), " Ana ", Some("ana@x.pt"), "manager").unwrap();
        assert_eq!(new.name, "Ana");
        assert_eq!(new.role, EmployeeRole::Manager);
        assert_eq!(new.email.as_deref(), Some("ana@x.pt"));
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        assert!(matches!(
            validate(EmployeeId::new(3), "Ana", None, "owner"),
            Err(EmployeeError::InvalidRole(_))
        ));
        assert!(matches!(
            validate(EmployeeId::new(3), "   ", None, "cashier"),
            Err(EmployeeError::EmptyName)
        ));
        assert!(matches!(
            validate(EmployeeId::new(3), "Ana", Some("ana"), "cashier"),
            Err(EmployeeError::InvalidEmail(_))
        ));
    }
}
