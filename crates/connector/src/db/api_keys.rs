//! WooCommerce REST API keys that Checkout POS may revoke.

use async_trait::async_trait;
use sqlx::PgPool;

use checkout_pos_core::ApiKeyId;

use super::RepositoryError;

/// Revocation of REST API keys.
#[async_trait]
pub trait ApiKeyStore: Send + Sync {
    /// Delete the key with `id`. Returns whether a key was removed.
    async fn revoke(&self, id: ApiKeyId) -> Result<bool, RepositoryError>;
}

/// `PostgreSQL`-backed key store (`kis.api_keys`).
#[derive(Clone)]
pub struct PgApiKeyStore {
    pool: PgPool,
}

impl PgApiKeyStore {
    /// Create a new key store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ApiKeyStore for PgApiKeyStore {
    async fn revoke(&self, id: ApiKeyId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM kis.api_keys WHERE key_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
