//! CLI command implementations.

pub mod connection;
pub mod migrate;
pub mod user;
