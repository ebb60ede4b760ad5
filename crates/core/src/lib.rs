//! Checkout POS Core - Shared types library.
//!
//! This crate provides the types shared by the Checkout POS components:
//! - `connector` - The connection lifecycle service (settings page, hooks, REST)
//! - `cli` - Command-line tools for migrations and operator tasks
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Decoding the merchant callback payload lives here because
//! it is pure data validation.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, merchant details, roles, and setting enums

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
