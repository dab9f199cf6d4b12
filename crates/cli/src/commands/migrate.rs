//! Database migration commands.
//!
//! # Usage
//!
//! ```bash
//! fs-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `FUEL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Shift schema migrations: `crates/shifts/migrations/`

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use fuel_station_shifts::config::{ConfigError, get_database_url};
use fuel_station_shifts::db;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the shift schema migrations.
pub async fn run() -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = get_database_url("FUEL_DATABASE_URL")?;

    tracing::info!("Connecting to back office database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running shift migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Shift migrations complete!");
    Ok(())
}
