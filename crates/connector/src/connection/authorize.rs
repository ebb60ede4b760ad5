//! WooCommerce-side authorization: the OAuth application Checkout POS uses
//! to call the store, and the webhooks that follow a granted token.

use secrecy::ExposeSecret;
use tracing::instrument;
use url::Url;

use checkout_pos_core::UserId;

use super::{CONNECTED, ConnectionController, ConnectionError};
use crate::lifecycle;
use crate::models::OAuthApplication;
use crate::notices::Notice;
use crate::webhooks::webhook_plan;

impl ConnectionController<'_> {
    /// Replace the local OAuth application and return the URL that hands
    /// its credentials to Checkout POS.
    ///
    /// # Errors
    ///
    /// Returns `Inactive` while the plugin is deactivated, `InvalidEndpoint`
    /// if a configured URL does not parse, or a repository error.
    #[instrument(skip(self))]
    pub async fn register_application(&self) -> Result<Url, ConnectionError> {
        if !lifecycle::is_plugin_active(self.state.options()).await? {
            return Err(ConnectionError::Inactive);
        }

        let endpoints = self.state.endpoints();
        let config = self.state.config();
        let domain = self.state.local_domain();
        let repository = self.repository();

        if repository.delete_application().await? {
            tracing::debug!("Removed previous OAuth application");
        }

        let mut callback_url = Url::parse(&endpoints.woo_oauth_callback_url)?;
        callback_url.query_pairs_mut().append_pair("domain", &domain);

        let application = OAuthApplication::generate(callback_url.into());
        repository.set_application(&application).await?;
        repository
            .set_connected_site_url(config.site_url.as_str())
            .await?;

        let mut url = Url::parse(&endpoints.woo_oauth_url)?;
        url.query_pairs_mut()
            .append_pair("consumerKey", &application.consumer_key)
            .append_pair("consumerSecret", application.consumer_secret.expose_secret())
            .append_pair("domain", &domain)
            .append_pair("restUrl", config.rest_url.as_str())
            .append_pair("successUrl", config.settings_url().as_str());

        tracing::info!(consumer_key = %application.consumer_key, "Registered OAuth application");
        Ok(url)
    }

    /// Record `user_id` as the owner when the token was granted to our
    /// application. Returns whether it was.
    ///
    /// # Errors
    ///
    /// Returns a repository error if the records cannot be read or written.
    #[instrument(skip(self))]
    pub async fn handle_access_token_granted(
        &self,
        consumer_key: &str,
        user_id: UserId,
    ) -> Result<bool, ConnectionError> {
        let repository = self.repository();
        let ours = repository
            .application()
            .await?
            .is_some_and(|app| app.consumer_key == consumer_key);

        if !ours || user_id.as_i64() <= 0 {
            return Ok(false);
        }

        repository.set_owner(user_id).await?;
        tracing::info!("Access token granted to Checkout POS");
        Ok(true)
    }

    /// Create the order and product webhooks after the store granted
    /// Checkout POS a token. Returns how many were created.
    ///
    /// A webhook that cannot be created is logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns `NotConnected` without merchant details, `MissingApplication`
    /// without a registered OAuth application, or a repository error.
    #[instrument(skip(self))]
    pub async fn complete_local_authorization(&self) -> Result<usize, ConnectionError> {
        let repository = self.repository();
        let merchant = repository
            .merchant()
            .await?
            .ok_or(ConnectionError::NotConnected)?;
        let application = repository
            .application()
            .await?
            .ok_or(ConnectionError::MissingApplication)?;

        let plan = webhook_plan(
            &self.state.endpoints().webhook_url,
            &self.state.local_domain(),
            merchant.merchant_id,
            &application.consumer_secret,
        );

        let webhooks = self.state.webhooks();
        let mut created = 0;
        for spec in &plan {
            match webhooks.create(spec).await {
                Ok(id) => {
                    tracing::debug!(webhook_id = %id, topic = %spec.topic, "Created webhook");
                    created += 1;
                }
                Err(e) => {
                    tracing::warn!(topic = %spec.topic, error = %e, "Could not create webhook");
                }
            }
        }

        self.state.notices().push(Notice::success(CONNECTED));
        tracing::info!(created, planned = plan.len(), "Webhooks registered");
        Ok(created)
    }
}
