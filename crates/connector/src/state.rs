//! Application state shared across handlers.

use std::sync::{Arc, PoisonError, RwLock};

use sqlx::PgPool;

use checkout_pos_core::Environment;

use crate::audit::{AuditMessages, HostEnvironment, StoredHostEnvironment};
use crate::config::ConnectorConfig;
use crate::db::{
    ApiKeyStore, OptionStore, PgApiKeyStore, PgOptionStore, PgUserDirectory, UserDirectory,
};
use crate::endpoints::RemoteEndpoints;
use crate::notices::NoticeQueue;
use crate::pos::{HttpPosBackend, PosBackend};
use crate::webhooks::{WebhookError, WebhookRegistry, WooWebhookClient};

/// Error wiring up the production backends.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid webhook endpoint: {0}")]
    Webhooks(#[from] WebhookError),
}

/// Everything the connector talks to.
#[derive(Clone)]
pub struct Backends {
    pub options: Arc<dyn OptionStore>,
    pub users: Arc<dyn UserDirectory>,
    pub api_keys: Arc<dyn ApiKeyStore>,
    pub webhooks: Arc<dyn WebhookRegistry>,
    pub pos: Arc<dyn PosBackend>,
    pub host: Arc<dyn HostEnvironment>,
}

impl Backends {
    /// `PostgreSQL` storage plus HTTP clients for the store and Checkout POS.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built or the store's
    /// REST URL cannot be joined with the webhook path.
    pub fn production(pool: PgPool, config: &ConnectorConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()?;
        let options: Arc<dyn OptionStore> = Arc::new(PgOptionStore::new(pool.clone()));

        Ok(Self {
            host: Arc::new(StoredHostEnvironment::new(Arc::clone(&options))),
            options,
            users: Arc::new(PgUserDirectory::new(pool.clone())),
            api_keys: Arc::new(PgApiKeyStore::new(pool)),
            webhooks: Arc::new(WooWebhookClient::new(
                client.clone(),
                &config.rest_url,
                config.woocommerce.clone(),
            )?),
            pos: Arc::new(HttpPosBackend::with_client(client)),
        })
    }
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable. Holds the backends, the resolved endpoints, and the
/// per-process notice and audit message queues.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ConnectorConfig,
    backends: Backends,
    endpoints: RwLock<RemoteEndpoints>,
    notices: NoticeQueue,
    audit_messages: AuditMessages,
}

impl AppState {
    /// Create the state. Endpoints start out resolved for production until
    /// the stored environment selection is loaded.
    #[must_use]
    pub fn new(config: ConnectorConfig, backends: Backends) -> Self {
        Self::with_audit_messages(config, backends, AuditMessages::default())
    }

    /// Create the state with a custom audit message store.
    #[must_use]
    pub fn with_audit_messages(
        config: ConnectorConfig,
        backends: Backends,
        audit_messages: AuditMessages,
    ) -> Self {
        let endpoints =
            RemoteEndpoints::resolve(Environment::Production, &config.endpoint_overrides);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                backends,
                endpoints: RwLock::new(endpoints),
                notices: NoticeQueue::default(),
                audit_messages,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConnectorConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn options(&self) -> &dyn OptionStore {
        self.inner.backends.options.as_ref()
    }

    #[must_use]
    pub fn users(&self) -> &dyn UserDirectory {
        self.inner.backends.users.as_ref()
    }

    #[must_use]
    pub fn api_keys(&self) -> &dyn ApiKeyStore {
        self.inner.backends.api_keys.as_ref()
    }

    #[must_use]
    pub fn webhooks(&self) -> &dyn WebhookRegistry {
        self.inner.backends.webhooks.as_ref()
    }

    #[must_use]
    pub fn pos(&self) -> &dyn PosBackend {
        self.inner.backends.pos.as_ref()
    }

    #[must_use]
    pub fn host(&self) -> &dyn HostEnvironment {
        self.inner.backends.host.as_ref()
    }

    #[must_use]
    pub fn notices(&self) -> &NoticeQueue {
        &self.inner.notices
    }

    #[must_use]
    pub fn audit_messages(&self) -> &AuditMessages {
        &self.inner.audit_messages
    }

    /// Currently resolved Checkout POS endpoints.
    #[must_use]
    pub fn endpoints(&self) -> RemoteEndpoints {
        self.inner
            .endpoints
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Re-resolve the endpoints for `environment`.
    pub fn reload_endpoints(&self, environment: Environment) -> RemoteEndpoints {
        let resolved =
            RemoteEndpoints::resolve(environment, &self.inner.config.endpoint_overrides);
        tracing::info!(endpoints = %resolved.label(), "Resolved Checkout POS endpoints");
        *self
            .inner
            .endpoints
            .write()
            .unwrap_or_else(PoisonError::into_inner) = resolved.clone();
        resolved
    }

    /// Host of the store's site URL.
    #[must_use]
    pub fn local_domain(&self) -> String {
        self.inner.config.site_domain()
    }
}
