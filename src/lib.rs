//! Core of the hackathon platform: reference resolution, caching,
//! relationship maintenance and per-operation rate limiting over a
//! document store.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
