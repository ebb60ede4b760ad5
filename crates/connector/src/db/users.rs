//! Users mirrored from the host site.
//!
//! The connection owner must still exist for the connection to count as
//! active, so user deletions on the host are forwarded here.

use async_trait::async_trait;
use sqlx::PgPool;

use checkout_pos_core::{UserId, UserRole};

use super::RepositoryError;
use crate::models::User;

/// Lookup and maintenance of host-site users.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by id.
    async fn find(&self, id: UserId) -> Result<Option<User>, RepositoryError>;

    /// Create or update a user.
    async fn upsert(&self, user: &User) -> Result<(), RepositoryError>;

    /// Remove a user. Returns whether it existed.
    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError>;

    /// All users, ordered by id.
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
}

/// Internal row type for `PostgreSQL` user queries.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i64,
    email: String,
    display_name: String,
    role: UserRole,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::new(row.id),
            email: row.email,
            display_name: row.display_name,
            role: row.role,
        }
    }
}

/// `PostgreSQL`-backed user directory (`kis.users`).
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    /// Create a new user directory.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, display_name, role
            FROM kis.users
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn upsert(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO kis.users (id, email, display_name, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO UPDATE
            SET email = $2, display_name = $3, role = $4, updated_at = NOW()
            ",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.display_name)
        .bind(user.role)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return RepositoryError::Conflict("email already exists".to_owned());
            }
            RepositoryError::Database(e)
        })?;

        Ok(())
    }

    async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM kis.users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query_as::<_, UserRow>(
            r"
            SELECT id, email, display_name, role
            FROM kis.users
            ORDER BY id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}
