//! Persistence for the connector.
//!
//! # Database: `kis` schema
//!
//! ## Tables
//!
//! - `options` - Named key-value settings (JSONB), the connector's only state store
//! - `users` - WordPress users mirrored from the host site (owner checks, capabilities)
//! - `api_keys` - WooCommerce REST API keys that Checkout POS can revoke
//!
//! Each table sits behind an `async_trait` seam so the lifecycle logic can run
//! against the in-memory implementations in [`memory`] as well.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/connector/migrations/` and run via:
//! ```bash
//! cargo run -p checkout-pos-cli -- migrate
//! ```

pub mod api_keys;
pub mod connection;
pub mod deleted_products;
pub mod memory;
pub mod options;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use api_keys::{ApiKeyStore, PgApiKeyStore};
pub use connection::ConnectionRepository;
pub use deleted_products::DeletedProductRepository;
pub use memory::{MemoryApiKeyStore, MemoryOptionStore, MemoryUserDirectory};
pub use options::{OptionStore, PgOptionStore, keys};
pub use users::{PgUserDirectory, UserDirectory};

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., duplicate user email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
