//! Integration test harness for the Checkout POS connector.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p checkout-pos-integration-tests
//! ```
//!
//! Every backend is in-memory and Checkout POS is replaced by [`FakePos`],
//! so no database or network is needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use url::Url;

use checkout_pos_connector::audit::{AuditConfig, HostReport, StoredHostEnvironment};
use checkout_pos_connector::config::{ConnectorConfig, EndpointOverrides, WooCommerceApiConfig};
use checkout_pos_connector::connection::{ConnectionController, ConnectionError};
use checkout_pos_connector::db::{
    ConnectionRepository, MemoryApiKeyStore, MemoryOptionStore, MemoryUserDirectory,
    OptionStore, RepositoryError, UserDirectory,
};
use checkout_pos_connector::models::User;
use checkout_pos_connector::pos::{PosBackend, PosError};
use checkout_pos_connector::routes;
use checkout_pos_connector::state::{AppState, Backends};
use checkout_pos_connector::webhooks::MemoryWebhookRegistry;
use checkout_pos_core::{UserId, UserRole};

pub const SHARED_SECRET: &str = "Vd7qK2mZp9XwL4nR8tYc3HbJ6sFgA1eU";
pub const SITE_URL: &str = "https://shop.example.fi/";
pub const OWNER_EMAIL: &str = "owner@shop.example.fi";

/// One recorded `revoke_link` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokeCall {
    pub delete_url: String,
    pub domain: String,
}

/// Scriptable stand-in for Checkout POS.
#[derive(Debug, Default)]
pub struct FakePos {
    revoked: Mutex<Vec<RevokeCall>>,
    audit_config: Mutex<Option<AuditConfig>>,
    unreachable: Mutex<HashSet<String>>,
}

impl FakePos {
    /// Serve `config` as the audit configuration. Without one the config URL
    /// answers 404.
    pub async fn serve_audit_config(&self, config: AuditConfig) {
        *self.audit_config.lock().await = Some(config);
    }

    /// Make probes of `url` fail.
    pub async fn make_unreachable(&self, url: &str) {
        self.unreachable.lock().await.insert(url.to_string());
    }

    pub async fn revoke_calls(&self) -> Vec<RevokeCall> {
        self.revoked.lock().await.clone()
    }
}

#[async_trait]
impl PosBackend for FakePos {
    async fn revoke_link(&self, delete_url: &str, domain: &str) -> Result<(), PosError> {
        self.revoked.lock().await.push(RevokeCall {
            delete_url: delete_url.to_string(),
            domain: domain.to_string(),
        });
        Ok(())
    }

    async fn fetch_audit_config(&self, _url: &str) -> Result<AuditConfig, PosError> {
        self.audit_config
            .lock()
            .await
            .clone()
            .ok_or(PosError::Status(404))
    }

    async fn probe(&self, url: &str) -> Result<(), PosError> {
        if self.unreachable.lock().await.contains(url) {
            Err(PosError::Status(503))
        } else {
            Ok(())
        }
    }
}

/// Connector configuration for tests.
///
/// # Panics
///
/// Panics if a literal URL does not parse.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn test_config() -> ConnectorConfig {
    ConnectorConfig {
        database_url: SecretString::from("postgres://localhost/kis_test"),
        host: "127.0.0.1".parse().unwrap(),
        port: 3002,
        base_url: Url::parse("https://connector.example.fi").unwrap(),
        site_url: Url::parse(SITE_URL).unwrap(),
        rest_url: Url::parse("https://shop.example.fi/wp-json/").unwrap(),
        shared_secret: SecretString::from(SHARED_SECRET),
        woocommerce: WooCommerceApiConfig {
            consumer_key: "ck_integration".to_string(),
            consumer_secret: SecretString::from("cs_Hq4Lz8WmN2xVb7Rk5TpYd3Jf"),
        },
        endpoint_overrides: EndpointOverrides::default(),
        http_timeout: Duration::from_secs(5),
        sentry_dsn: None,
        sentry_environment: None,
        sentry_sample_rate: 1.0,
        sentry_traces_sample_rate: 1.0,
        tls: None,
    }
}

/// Shared state wired to in-memory backends, with handles on each.
pub struct TestContext {
    pub state: AppState,
    pub options: Arc<MemoryOptionStore>,
    pub users: Arc<MemoryUserDirectory>,
    pub api_keys: Arc<MemoryApiKeyStore>,
    pub webhooks: Arc<MemoryWebhookRegistry>,
    pub pos: Arc<FakePos>,
}

impl TestContext {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    #[must_use]
    pub fn with_config(config: ConnectorConfig) -> Self {
        let options = Arc::new(MemoryOptionStore::default());
        let users = Arc::new(MemoryUserDirectory::default());
        let api_keys = Arc::new(MemoryApiKeyStore::default());
        let webhooks = Arc::new(MemoryWebhookRegistry::default());
        let pos = Arc::new(FakePos::default());

        let options_dyn: Arc<dyn OptionStore> = options.clone();
        let backends = Backends {
            host: Arc::new(StoredHostEnvironment::new(Arc::clone(&options_dyn))),
            options: options_dyn,
            users: users.clone(),
            api_keys: api_keys.clone(),
            webhooks: webhooks.clone(),
            pos: pos.clone(),
        };

        Self {
            state: AppState::new(config, backends),
            options,
            users,
            api_keys,
            webhooks,
            pos,
        }
    }

    /// The full router, with state.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::routes().with_state(self.state.clone())
    }

    /// Mirror a user with `role`.
    ///
    /// # Errors
    ///
    /// Returns the directory's error.
    pub async fn add_user(&self, id: i64, role: UserRole) -> Result<User, RepositoryError> {
        let user = User {
            id: UserId::new(id),
            email: format!("user{id}@shop.example.fi"),
            display_name: format!("User {id}"),
            role,
        };
        self.users.upsert(&user).await?;
        Ok(user)
    }

    /// Store a raw option value.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn set_option(&self, key: &str, value: JsonValue) -> Result<(), RepositoryError> {
        self.options.set(key, &value).await
    }

    /// Store host facts as the host would report them.
    ///
    /// # Errors
    ///
    /// Returns the store's error.
    pub async fn report_host(&self, report: HostReport) -> Result<(), RepositoryError> {
        report.store(self.options.as_ref()).await
    }

    /// Complete a handshake as an administrator. Returns the owner.
    ///
    /// # Errors
    ///
    /// Returns the controller's error.
    pub async fn connect(&self) -> Result<User, ConnectionError> {
        let owner = self.add_user(1, UserRole::Administrator).await?;
        let payload = merchant_payload(&serde_json::json!({
            "merchant_id": 4711,
            "owner_email": OWNER_EMAIL,
            "merchant_name": "Example Shop Oy",
            "merchant_billing_street_name": "Mannerheimintie 1",
            "merchant_billing_zip": "00100",
            "merchant_billing_city": "Helsinki"
        }));
        ConnectionController::new(&self.state)
            .complete_connect(Some(&owner), &payload)
            .await?;
        Ok(owner)
    }

    /// Whether the store is connected.
    ///
    /// # Errors
    ///
    /// Returns the repository's error.
    pub async fn is_connected(&self) -> Result<bool, RepositoryError> {
        Ok(ConnectionRepository::new(self.options.as_ref())
            .load(self.users.as_ref())
            .await?
            .is_connected)
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Encode a merchant blob the way Checkout POS sends it.
#[must_use]
pub fn merchant_payload(value: &JsonValue) -> String {
    STANDARD.encode(value.to_string())
}
