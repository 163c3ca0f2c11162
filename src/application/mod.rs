//! Application services layer.

pub mod catalog;
pub mod error;
pub mod platform;
pub mod ports;
pub mod relations;
pub mod repos;
pub mod resolver;
