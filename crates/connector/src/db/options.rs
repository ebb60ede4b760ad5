//! Named key-value settings.
//!
//! Every piece of connector state (connection owner, merchant details,
//! environment selection, sync directions, ...) is one JSON value under a
//! well-known key.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use sqlx::PgPool;

use super::RepositoryError;

/// Well-known option keys.
pub mod keys {
    /// Id of the user who owns the Checkout POS connection.
    pub const OWNER_USER: &str = "kis_oauth_woo_user";
    /// Merchant details from the last successful handshake.
    pub const MERCHANT_DETAILS: &str = "kis_merchant_details";
    /// Site URL recorded when the connection was made.
    pub const CONNECTED_SITE_URL: &str = "kassa_connected_site_url";
    /// `"yes"` selects the test environment, `"no"` production.
    pub const TEST_ENVIRONMENT: &str = "kis_test_environment_enabled";
    /// `"yes"` makes Checkout POS pass REST credentials as URL parameters.
    pub const AUTH_PARAMS: &str = "kis_woo_auth_params_enabled";
    /// Whether WooCommerce calculates taxes for POS orders.
    pub const TAX_CALCULATION: &str = "kis_woo_tax_calc_enabled";
    /// Product id to deletion timestamp.
    pub const DELETED_PRODUCTS: &str = "kis_deleted_products";
    /// WooCommerce-side OAuth application registered for Checkout POS.
    pub const OAUTH_APPLICATION: &str = "kis_oauth_client";
    /// Whether the plugin is active. Absent means active.
    pub const PLUGIN_ACTIVE: &str = "kis_plugin_active";
    /// Active plugins reported by the host site.
    pub const ACTIVE_PLUGINS: &str = "active_plugins";
    /// PHP ini values reported by the host site.
    pub const HOST_INI: &str = "kis_host_ini";
    /// WordPress options reported by the host site.
    pub const HOST_OPTIONS: &str = "kis_host_options";
    /// qTranslate settings reported by the host site.
    pub const QTRANSLATE_CONFIG: &str = "qtranslate_config";
}

/// Storage for named settings.
#[async_trait]
pub trait OptionStore: Send + Sync {
    /// Read an option. `None` when it was never set or has been deleted.
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, RepositoryError>;

    /// Create or replace an option.
    async fn set(&self, key: &str, value: &JsonValue) -> Result<(), RepositoryError>;

    /// Delete an option. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool, RepositoryError>;
}

/// Read an option and deserialize it.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if the stored value does not
/// have the expected shape.
pub async fn get_typed<T: DeserializeOwned>(
    store: &dyn OptionStore,
    key: &str,
) -> Result<Option<T>, RepositoryError> {
    store
        .get(key)
        .await?
        .map(|value| {
            serde_json::from_value(value)
                .map_err(|e| RepositoryError::DataCorruption(format!("option {key}: {e}")))
        })
        .transpose()
}

/// Serialize a value and store it as an option.
///
/// # Errors
///
/// Returns `RepositoryError::DataCorruption` if the value cannot be
/// serialized, or the store's error if the write fails.
pub async fn set_typed<T: Serialize + Sync>(
    store: &dyn OptionStore,
    key: &str,
    value: &T,
) -> Result<(), RepositoryError> {
    let json = serde_json::to_value(value)
        .map_err(|e| RepositoryError::DataCorruption(format!("option {key}: {e}")))?;
    store.set(key, &json).await
}

/// Read a string option. Non-string scalars are rendered as text.
///
/// # Errors
///
/// Returns the store's error if the read fails.
pub async fn get_string(
    store: &dyn OptionStore,
    key: &str,
) -> Result<Option<String>, RepositoryError> {
    Ok(store.get(key).await?.and_then(|value| match value {
        JsonValue::String(s) => Some(s),
        JsonValue::Bool(b) => Some(if b { "yes" } else { "no" }.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    }))
}

/// `PostgreSQL`-backed option store (`kis.options`).
#[derive(Clone)]
pub struct PgOptionStore {
    pool: PgPool,
}

impl PgOptionStore {
    /// Create a new option store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OptionStore for PgOptionStore {
    async fn get(&self, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
        let value = sqlx::query_scalar::<_, JsonValue>(
            r"
            SELECT value FROM kis.options
            WHERE key = $1
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO kis.options (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
            ",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM kis.options
            WHERE key = $1
            ",
        )
        .bind(key)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
