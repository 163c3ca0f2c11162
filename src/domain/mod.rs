//! Document model and inbound payloads.

pub mod documents;
pub mod error;
pub mod payloads;
