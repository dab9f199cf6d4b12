//! Database operations for the back office `PostgreSQL`.
//!
//! ## Tables
//!
//! - `employees` - Staff records (ids issued by the sign-in system)
//! - `shifts` - Shifts, with `shifts_single_open_idx` allowing one open row
//! - `shift_payment_methods` - Payment breakdown written at close
//! - `sales` - Sales, read here only for the running shift total
//!
//! # Migrations
//!
//! Migrations are stored in `crates/shifts/migrations/` and run via:
//! ```bash
//! cargo run -p fuel-station-cli -- migrate
//! ```

pub mod shifts;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use sqlx::postgres::PgPoolOptions;

use crate::store::StoreError;

pub use shifts::PgShiftStore;

/// Embedded shift schema migrations.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// `PostgreSQL` SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

/// Create a `PostgreSQL` connection pool without connecting.
///
/// A till must boot while the network is down, so connections are opened
/// on first use and the connectivity probe reports reachability.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection string cannot be parsed.
pub fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url.expose_secret())
}

/// Run the embedded migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Io(e) => Self::Unavailable(e.to_string()),
            sqlx::Error::Tls(e) => Self::Unavailable(e.to_string()),
            sqlx::Error::PoolClosed => Self::Unavailable("connection pool closed".to_string()),
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::ColumnDecode { index, source } => {
                Self::DataCorruption(format!("column {index}: {source}"))
            }
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                Self::Conflict(db.message().to_string())
            }
            other => Self::Database(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failures_are_transient() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(StoreError::from(sqlx::Error::Io(io)).is_transient());
        assert!(StoreError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StoreError::from(sqlx::Error::PoolClosed).is_transient());
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::NotFound
        ));
    }

    #[test]
    fn test_other_errors_are_not_retried() {
        let err = StoreError::from(sqlx::Error::Protocol("bad message".to_string()));
        assert!(matches!(err, StoreError::Database(_)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_create_pool_is_lazy() {
        let url = secrecy::SecretString::from("postgres://till@127.0.0.1:1/fuel".to_string());
        assert!(create_pool(&url).is_ok());
    }
}
