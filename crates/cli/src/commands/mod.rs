//! CLI command implementations.

pub mod employee;
pub mod migrate;
pub mod shift;
