//! Fuel station shift lifecycle library.
//!
//! A shift is a cash-drawer and staffing session owned by one employee. At
//! most one shift may be open across the whole station at any instant, even
//! with several tills opening and closing concurrently, some of them offline
//! or retrying.
//!
//! # Layers
//!
//! - [`store`] - the durable store seam, with an in-memory implementation
//! - [`db`] - the `PostgreSQL` store and schema migrations
//! - [`cache`] - the till-local advisory cache of the last known open shift
//! - [`connectivity`] - the online/offline signal
//! - [`services`] - the lifecycle manager, reconciliation and retry
//! - [`routes`] - the local HTTP API the till's UI calls

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;
