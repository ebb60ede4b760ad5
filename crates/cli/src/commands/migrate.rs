//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! kis-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `KIS_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Connector migrations: `crates/connector/migrations/`

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use thiserror::Error;

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Database URL from `KIS_DATABASE_URL`, falling back to `DATABASE_URL`.
pub(crate) fn database_url() -> Result<SecretString, MigrationError> {
    dotenvy::dotenv().ok();

    std::env::var("KIS_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingEnvVar("KIS_DATABASE_URL"))
}

/// Run connector database migrations.
pub async fn run() -> Result<(), MigrationError> {
    let database_url = database_url()?;

    tracing::info!("Connecting to connector database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    tracing::info!("Running connector migrations...");
    sqlx::migrate!("../connector/migrations").run(&pool).await?;

    tracing::info!("Connector migrations complete!");
    Ok(())
}
