//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod integrations;
pub mod rate_limit;
pub mod store;
pub mod telemetry;
