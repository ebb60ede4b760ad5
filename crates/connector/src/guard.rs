//! Environment guard.
//!
//! Keeps a connection from surviving a change of the environment it was made
//! in: a new site domain, a missing environment selection, or an edited
//! environment or auth-delivery setting all force a disconnect.

use tracing::instrument;
use url::Url;

use checkout_pos_core::Environment;

use crate::connection::{ConnectionController, ConnectionError};
use crate::db::options::get_string;
use crate::db::{ConnectionRepository, keys};
use crate::lifecycle;
use crate::notices::Notice;
use crate::state::AppState;

/// Settings whose change invalidates the connection.
pub const WATCHED_SETTINGS: [&str; 2] = [keys::TEST_ENVIRONMENT, keys::AUTH_PARAMS];

/// How the guard reacted to a settings change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingChange {
    /// The connection was dropped and the endpoints recomputed; the page
    /// must be reloaded.
    Reloaded,
    Unchanged,
}

/// Warning shown once after the site moved to a new domain.
#[must_use]
pub fn domain_change_warning(old: &str, new: &str) -> String {
    format!(
        "Your site URL has changed from {old} to {new}. The connection to Checkout POS was \
         removed. Reconnecting may create duplicate products in Checkout POS."
    )
}

fn host_of(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.trim().trim_end_matches('/').to_string())
}

pub struct EnvironmentGuard<'a> {
    state: &'a AppState,
}

impl<'a> EnvironmentGuard<'a> {
    #[must_use]
    pub const fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    /// Drop the connection if the site domain no longer matches the one
    /// recorded at connect time. Returns whether it did.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection records cannot be read or cleared.
    #[instrument(skip(self))]
    pub async fn check_site_domain(&self) -> Result<bool, ConnectionError> {
        let repository = ConnectionRepository::new(self.state.options());
        let Some(recorded) = repository
            .connected_site_url()
            .await?
            .filter(|url| !url.trim().is_empty())
        else {
            return Ok(false);
        };

        let current_domain = self.state.local_domain();
        if host_of(&recorded) == current_domain {
            return Ok(false);
        }

        tracing::warn!(recorded = %recorded, current = %current_domain, "Site domain changed, dropping connection");
        ConnectionController::new(self.state).force_disconnect().await?;
        repository.clear_connected_site_url().await?;

        let current = self.state.config().site_url.to_string();
        self.state
            .notices()
            .push(Notice::warning(domain_change_warning(&recorded, &current)));
        Ok(true)
    }

    /// Default the environment selection to production when it was never
    /// made. Returns whether it had to.
    ///
    /// # Errors
    ///
    /// Returns an error if the option cannot be read or written.
    #[instrument(skip(self))]
    pub async fn ensure_environment_selected(&self) -> Result<bool, ConnectionError> {
        let options = self.state.options();
        let selected = get_string(options, keys::TEST_ENVIRONMENT)
            .await?
            .is_some_and(|v| !v.is_empty());
        if selected {
            return Ok(false);
        }

        tracing::info!("No environment selected, defaulting to production");
        ConnectionController::new(self.state).force_disconnect().await?;
        options
            .set(
                keys::TEST_ENVIRONMENT,
                &serde_json::Value::String(Environment::Production.test_flag().to_string()),
            )
            .await?;
        self.state.reload_endpoints(Environment::Production);
        Ok(true)
    }

    /// React to a saved setting.
    ///
    /// Only [`WATCHED_SETTINGS`] matter, and only when the new value is
    /// non-empty and differs from the old one.
    ///
    /// # Errors
    ///
    /// Returns an error if the forced disconnect fails locally.
    #[instrument(skip(self))]
    pub async fn on_setting_changed(
        &self,
        key: &str,
        new: &str,
        old: &str,
    ) -> Result<SettingChange, ConnectionError> {
        if !WATCHED_SETTINGS.contains(&key) || new.is_empty() || new == old {
            return Ok(SettingChange::Unchanged);
        }

        tracing::info!("Connection setting changed, dropping connection");
        ConnectionController::new(self.state).force_disconnect().await?;

        let environment = if key == keys::TEST_ENVIRONMENT {
            Environment::from_test_flag(new)
        } else {
            lifecycle::current_environment(self.state.options()).await?
        };
        self.state.reload_endpoints(environment);
        Ok(SettingChange::Reloaded)
    }
}
