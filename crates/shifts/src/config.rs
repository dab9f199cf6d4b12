//! Till configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `FUEL_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `TILL_OPERATOR_ID` - Employee id of the signed-in operator
//! - `TILL_OPERATOR_NAME` - Display name of the operator
//!
//! ## Optional
//! - `TILL_OPERATOR_EMAIL` - Operator email, used when synthesizing a staff record
//! - `TILL_OPERATOR_ROLE` - `cashier`, `supervisor` or `manager` (default: cashier)
//! - `TILL_HOST` - Bind address (default: 127.0.0.1)
//! - `TILL_PORT` - Listen port (default: 3002)
//! - `TILL_CACHE_PATH` - Local shift cache file (default: .till/active_shift.json)
//! - `SHIFT_REFRESH_INTERVAL_SECS` - Sales total refresh period (default: 30)
//! - `SHIFT_WATCHDOG_INTERVAL_SECS` - Watchdog tick period (default: 5)
//! - `SHIFT_STUCK_CHECK_SECS` - Age at which a check counts as stuck (default: 10)
//! - `SHIFT_RETRY_ATTEMPTS` - Attempts for retried store calls (default: 3)
//! - `SHIFT_RETRY_BASE_DELAY_MS` - Linear backoff base delay (default: 1000)
//! - `CONNECTIVITY_PROBE_SECS` - Database probe period (default: 5)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)
//! - `TILL_LOG_JSON` - Emit JSON logs when set

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

use fuel_station_core::{EmployeeId, EmployeeRole};

use crate::models::OperatorProfile;
use crate::services::{RetryPolicy, ShiftSettings};

const DEFAULT_CACHE_PATH: &str = ".till/active_shift.json";

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Till agent configuration.
#[derive(Debug, Clone)]
pub struct TillConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the local API to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// The signed-in operator
    pub operator: OperatorProfile,
    /// Where the local shift cache lives
    pub cache_path: PathBuf,
    /// Lifecycle timing
    pub shifts: ShiftSettings,
    /// Database probe period
    pub probe_interval: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// Emit JSON logs instead of text
    pub log_json: bool,
}

impl TillConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("FUEL_DATABASE_URL")?;
        let host = parse_env("TILL_HOST", "127.0.0.1")?;
        let port = parse_env("TILL_PORT", "3002")?;
        let operator = operator_from_env()?;
        let cache_path = PathBuf::from(get_env_or_default("TILL_CACHE_PATH", DEFAULT_CACHE_PATH));
        let shifts = shift_settings_from_env()?;
        let probe_interval = Duration::from_secs(parse_env("CONNECTIVITY_PROBE_SECS", "5")?);
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.1);
        let log_json = get_optional_env("TILL_LOG_JSON").is_some();

        Ok(Self {
            database_url,
            host,
            port,
            operator,
            cache_path,
            shifts,
            probe_interval,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            log_json,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

/// Operator profile from `TILL_OPERATOR_*`.
///
/// # Errors
///
/// Returns `ConfigError` if the id or name is missing or the id is not an
/// integer.
pub fn operator_from_env() -> Result<OperatorProfile, ConfigError> {
    let employee_id: EmployeeId = parse_required_env("TILL_OPERATOR_ID")?;
    let name = get_required_env("TILL_OPERATOR_NAME")?;
    let role = match get_optional_env("TILL_OPERATOR_ROLE") {
        Some(raw) => raw
            .parse::<EmployeeRole>()
            .map_err(|e| ConfigError::InvalidEnvVar("TILL_OPERATOR_ROLE".to_string(), e))?,
        None => EmployeeRole::default(),
    };

    Ok(OperatorProfile {
        employee_id,
        name,
        email: get_optional_env("TILL_OPERATOR_EMAIL"),
        role,
    })
}

/// Lifecycle timing from `SHIFT_*`.
///
/// # Errors
///
/// Returns `ConfigError` if a value is not a non-negative integer.
pub fn shift_settings_from_env() -> Result<ShiftSettings, ConfigError> {
    let max_attempts: u32 = parse_env("SHIFT_RETRY_ATTEMPTS", "3")?;
    if max_attempts == 0 {
        return Err(ConfigError::InvalidEnvVar(
            "SHIFT_RETRY_ATTEMPTS".to_string(),
            "must be at least 1".to_string(),
        ));
    }

    Ok(ShiftSettings {
        refresh_interval: Duration::from_secs(parse_env("SHIFT_REFRESH_INTERVAL_SECS", "30")?),
        watchdog_interval: Duration::from_secs(parse_env("SHIFT_WATCHDOG_INTERVAL_SECS", "5")?),
        stuck_check_timeout: Duration::from_secs(parse_env("SHIFT_STUCK_CHECK_SECS", "10")?),
        retry: RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(parse_env("SHIFT_RETRY_BASE_DELAY_MS", "1000")?),
        },
    })
}

/// Database URL from `primary_key`, falling back to `DATABASE_URL`.
///
/// # Errors
///
/// Returns `ConfigError::MissingEnvVar` if neither is set.
pub fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_required_env<T>(key: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_required_env(key)?)
}

fn parse_env<T>(key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_value(key, &get_env_or_default(key, default))
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TillConfig {
        TillConfig {
            database_url: SecretString::from("postgres://localhost/test"),
            host: "127.0.0.1".parse().unwrap(),
            port: 3002,
            operator: OperatorProfile::new(EmployeeId::new(7), "Ana"),
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            shifts: ShiftSettings::default(),
            probe_interval: Duration::from_secs(5),
            sentry_dsn: None,
            sentry_environment: None,
            sentry_sample_rate: 1.0,
            sentry_traces_sample_rate: 0.1,
            log_json: false,
        }
    }

    #[test]
    fn test_socket_addr() {
        let addr = config().socket_addr();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 3002);
    }

    #[test]
    fn test_debug_redacts_database_url() {
        let debug = format!("{:?}", config());
        assert!(!debug.contains("postgres://localhost/test"));
    }

    #[test]
    fn test_parse_value() {
        let id: EmployeeId = parse_value("TILL_OPERATOR_ID", " 42 ").unwrap();
        assert_eq!(id, EmployeeId::new(42));

        let port: Result<u16, _> = parse_value("TILL_PORT", "70000");
        assert!(matches!(port, Err(ConfigError::InvalidEnvVar(key, _)) if key == "TILL_PORT"));
    }
}
