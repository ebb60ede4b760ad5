//! Checkout POS connector library.
//!
//! Manages the lifecycle of the link between a WooCommerce store and the
//! Checkout POS service: the OAuth handshake in both directions, webhook
//! registration, environment switching, the system audit and teardown.
//!
//! # Security
//!
//! This crate holds the WooCommerce REST credentials and the OAuth client
//! secret handed to Checkout POS. Admin requests must be signed by the host
//! site (see [`middleware::auth`]).

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod audit;
pub mod config;
pub mod connection;
pub mod db;
pub mod endpoints;
pub mod error;
pub mod guard;
pub mod hooks;
pub mod lifecycle;
pub mod middleware;
pub mod models;
pub mod notices;
pub mod pos;
pub mod routes;
pub mod state;
pub mod webhooks;
