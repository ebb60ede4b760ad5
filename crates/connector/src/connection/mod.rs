//! Connection controller.
//!
//! Drives the handshake between the store, Checkout POS and the local OAuth
//! application. The handshake runs in three legs:
//!
//! 1. [`begin_connect`](ConnectionController::begin_connect) sends the admin to
//!    Checkout POS, which answers with a base64 merchant blob.
//! 2. [`complete_connect`](ConnectionController::complete_connect) stores the
//!    merchant and the owning user.
//! 3. Once the store's OAuth server grants Checkout POS a token,
//!    [`complete_local_authorization`](ConnectionController::complete_local_authorization)
//!    registers the webhooks.
//!
//! Every failure resolves to a safe local state: disconnected, with a notice.

mod authorize;

use thiserror::Error;
use tracing::instrument;
use url::Url;

use checkout_pos_core::{MerchantDetails, MerchantError};

use crate::db::options::get_string;
use crate::db::{ConnectionRepository, RepositoryError, keys};
use crate::lifecycle;
use crate::models::User;
use crate::notices::Notice;
use crate::state::AppState;
use crate::webhooks::{WEBHOOK_NAME_PREFIX, WEBHOOK_SEARCH_LIMIT};

pub const CONNECT_DENIED: &str = "You are not allowed to create the connection!";
pub const CONNECT_FAILED: &str = "Connecting to Checkout POS failed!";
pub const CONNECTED: &str = "Connected successfully!";
pub const CANCEL_DENIED: &str = "You are not allowed to cancel the connection!";
pub const CANCELLED: &str = "The KIS connection was successfully cancelled!";

/// Errors from connection operations.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The acting user may not manage the connection.
    #[error("not allowed to manage the Checkout POS connection")]
    PermissionDenied,

    /// The merchant payload from Checkout POS is unusable.
    #[error("invalid merchant payload: {0}")]
    InvalidPayload(#[from] MerchantError),

    /// No merchant is connected.
    #[error("not connected to Checkout POS")]
    NotConnected,

    /// No local OAuth application has been registered.
    #[error("no OAuth application registered")]
    MissingApplication,

    /// The plugin is deactivated.
    #[error("the plugin is not active")]
    Inactive,

    /// A configured endpoint is not a valid URL.
    #[error("invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// What a disconnect request did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Neither a command nor a forced disconnect; nothing happened.
    Skipped,
    /// Local records were cleared.
    Disconnected { webhooks_removed: usize },
}

/// Connection operations over the shared state.
pub struct ConnectionController<'a> {
    state: &'a AppState,
}

impl<'a> ConnectionController<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn repository(&self) -> ConnectionRepository<'a> {
        ConnectionRepository::new(self.state.options())
    }

    /// Whether the owner still exists and valid merchant details are stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError` if the records cannot be read.
    pub async fn is_connected(&self) -> Result<bool, RepositoryError> {
        Ok(self
            .repository()
            .load(self.state.users())
            .await?
            .is_connected)
    }

    /// URL that starts the Checkout POS authorization.
    ///
    /// # Errors
    ///
    /// Returns `ConnectionError::Inactive` while the plugin is deactivated,
    /// or `InvalidEndpoint` if the configured URL does not parse.
    pub async fn begin_connect(&self) -> Result<Url, ConnectionError> {
        if !lifecycle::is_plugin_active(self.state.options()).await? {
            return Err(ConnectionError::Inactive);
        }

        let config = self.state.config();
        let auth_params = get_string(self.state.options(), keys::AUTH_PARAMS)
            .await?
            .is_some_and(|v| v == "yes");

        let mut url = Url::parse(&self.state.endpoints().kassa_oauth_url)?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("domain", &self.state.local_domain())
                .append_pair("woo_return_url", config.settings_url().as_str())
                .append_pair("kassa_oauth", "1")
                .append_pair("rest_url", config.rest_url.as_str());
            if auth_params {
                query.append_pair("auth_params", "1");
            }
        }
        Ok(url)
    }

    /// Store the merchant returned by Checkout POS.
    ///
    /// This is a full replace: the merchant details and the owner are
    /// overwritten, and the current site URL is recorded.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` without touching any state when `actor`
    /// may not manage the connection, or `InvalidPayload` after resetting
    /// the connection when the payload is unusable.
    #[instrument(skip(self, actor, payload), fields(user_id = actor.map(|u| u.id.as_i64())))]
    pub async fn complete_connect(
        &self,
        actor: Option<&User>,
        payload: &str,
    ) -> Result<MerchantDetails, ConnectionError> {
        let Some(user) = actor.filter(|u| u.can_manage_connection()) else {
            self.state
                .notices()
                .push_to(actor.map(|u| u.id), Notice::error(CONNECT_DENIED));
            return Err(ConnectionError::PermissionDenied);
        };

        let merchant = match MerchantDetails::from_callback_payload(payload) {
            Ok(merchant) => merchant,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected merchant payload");
                self.clear_local().await?;
                self.state
                    .notices()
                    .push_for(user.id, Notice::error(CONNECT_FAILED));
                return Err(e.into());
            }
        };

        let repository = self.repository();
        repository.set_merchant(&merchant).await?;
        repository.set_owner(user.id).await?;
        repository
            .set_connected_site_url(self.state.config().site_url.as_str())
            .await?;

        tracing::info!(merchant_id = ?merchant.merchant_id, "Stored Checkout POS merchant");
        Ok(merchant)
    }

    /// Handle a disconnect request.
    ///
    /// Runs only for an explicit `command` or when `force` is set. Unless
    /// forced, the actor needs the connection-management permission.
    /// Clearing an already cleared connection is harmless.
    ///
    /// # Errors
    ///
    /// Returns `PermissionDenied` when the actor may not disconnect, or a
    /// repository error if the records cannot be deleted.
    #[instrument(skip(self, actor))]
    pub async fn disconnect(
        &self,
        command: bool,
        force: bool,
        actor: Option<&User>,
    ) -> Result<DisconnectOutcome, ConnectionError> {
        if !command && !force {
            return Ok(DisconnectOutcome::Skipped);
        }

        if !force && !actor.is_some_and(User::can_manage_connection) {
            self.state
                .notices()
                .push_to(actor.map(|u| u.id), Notice::error(CANCEL_DENIED));
            return Err(ConnectionError::PermissionDenied);
        }

        let webhooks_removed = self.clear_local().await?;
        if !force {
            self.state
                .notices()
                .push_to(actor.map(|u| u.id), Notice::success(CANCELLED));
        }

        tracing::info!(force, webhooks_removed, "Disconnected from Checkout POS");
        Ok(DisconnectOutcome::Disconnected { webhooks_removed })
    }

    /// Disconnect without a user, telling Checkout POS first when a
    /// connection exists.
    ///
    /// The remote call is best effort; local cleanup always runs.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the records cannot be read or deleted.
    #[instrument(skip(self))]
    pub async fn force_disconnect(&self) -> Result<usize, ConnectionError> {
        if self.is_connected().await? {
            let delete_url = self.state.endpoints().kassa_delete_oauth_url;
            if let Err(e) = self
                .state
                .pos()
                .revoke_link(&delete_url, &self.state.local_domain())
                .await
            {
                tracing::warn!(error = %e, "Checkout POS did not acknowledge the disconnect");
            }
        }

        match self.disconnect(false, true, None).await? {
            DisconnectOutcome::Disconnected { webhooks_removed } => Ok(webhooks_removed),
            DisconnectOutcome::Skipped => Ok(0),
        }
    }

    /// Link on the settings page that cancels the connection via Checkout POS.
    ///
    /// # Errors
    ///
    /// Returns `InvalidEndpoint` if the delete endpoint does not parse.
    pub fn cancel_url(&self) -> Result<Url, ConnectionError> {
        let mut success_url = self.state.config().settings_url();
        success_url
            .query_pairs_mut()
            .append_pair("kis_oauth_cancel", "1");

        let mut url = Url::parse(&self.state.endpoints().kassa_delete_oauth_url)?;
        url.query_pairs_mut()
            .append_pair("domain", &self.state.local_domain())
            .append_pair("success_url", success_url.as_str());
        Ok(url)
    }

    /// Delete the merchant, the owner and every webhook this connector made.
    async fn clear_local(&self) -> Result<usize, ConnectionError> {
        self.repository().clear().await?;

        let webhooks = self.state.webhooks();
        let existing = match webhooks
            .search(WEBHOOK_NAME_PREFIX, WEBHOOK_SEARCH_LIMIT)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list webhooks for removal");
                return Ok(0);
            }
        };

        let mut removed = 0;
        for webhook in existing {
            match webhooks.delete(webhook.id).await {
                Ok(()) => removed += 1,
                Err(e) => {
                    tracing::warn!(webhook_id = %webhook.id, name = %webhook.name, error = %e, "Could not delete webhook");
                }
            }
        }
        Ok(removed)
    }
}
