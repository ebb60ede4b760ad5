//! Mirrored user management.
//!
//! The host site normally keeps users in sync through `user_upserted` and
//! `user_deleted` hooks. These commands cover bootstrapping and repair.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use checkout_pos_connector::db::{PgUserDirectory, RepositoryError, UserDirectory};
use checkout_pos_connector::models::User;
use checkout_pos_core::{UserId, UserRole};

use super::migrate::{MigrationError, database_url};

/// Errors that can occur during user operations.
#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Environment(#[from] MigrationError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Invalid role: {0}. Valid roles: administrator, shop_manager, editor, author, customer")]
    InvalidRole(String),

    #[error("Invalid email: {0}")]
    InvalidEmail(String),
}

async fn directory() -> Result<PgUserDirectory, UserError> {
    let database_url = database_url()?;
    tracing::info!("Connecting to connector database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;
    Ok(PgUserDirectory::new(pool))
}

/// Create or update a user.
pub async fn upsert(id: i64, email: &str, name: &str, role: &str) -> Result<(), UserError> {
    let role: UserRole = role
        .parse()
        .map_err(|_| UserError::InvalidRole(role.to_owned()))?;

    // Basic email validation
    if !email.contains('@') {
        return Err(UserError::InvalidEmail(email.to_owned()));
    }

    let user = User {
        id: UserId::new(id),
        email: email.to_owned(),
        display_name: name.to_owned(),
        role,
    };
    directory().await?.upsert(&user).await?;

    tracing::info!(
        "User saved! ID: {}, Email: {}, Role: {}, Manages connection: {}",
        user.id,
        user.email,
        user.role,
        user.can_manage_connection()
    );
    Ok(())
}

/// List all users.
pub async fn list() -> Result<(), UserError> {
    let users = directory().await?.list().await?;
    if users.is_empty() {
        tracing::info!("No users mirrored yet");
    }
    for user in users {
        tracing::info!(
            "{:>6}  {:<14} {} ({})",
            user.id,
            user.role,
            user.email,
            user.display_name
        );
    }
    Ok(())
}
