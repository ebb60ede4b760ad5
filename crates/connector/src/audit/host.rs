//! Facts about the host site the audit inspects.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::db::{OptionStore, RepositoryError, keys};
use crate::db::options::{get_typed, set_typed};

/// qTranslate settings, when that plugin is installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizationSettings {
    #[serde(default)]
    pub hide_default_language: Option<bool>,
}

/// Source of host facts.
#[async_trait]
pub trait HostEnvironment: Send + Sync {
    /// PHP ini values by name.
    async fn ini_values(&self) -> Result<HashMap<String, String>, RepositoryError>;

    /// Identifiers of the active plugins.
    async fn active_plugins(&self) -> Result<HashSet<String>, RepositoryError>;

    /// WordPress options the host site reported, by name.
    async fn options(&self) -> Result<HashMap<String, JsonValue>, RepositoryError>;

    /// qTranslate settings, `None` when the plugin is not present.
    async fn localization(&self) -> Result<Option<LocalizationSettings>, RepositoryError>;
}

/// Snapshot pushed by the host site through the `host_environment` hook.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct HostReport {
    #[serde(default)]
    pub ini: HashMap<String, JsonValue>,
    #[serde(default)]
    pub active_plugins: Vec<String>,
    #[serde(default)]
    pub options: HashMap<String, JsonValue>,
    #[serde(default)]
    pub localization: Option<LocalizationSettings>,
}

impl HostReport {
    /// Persist the snapshot as options.
    ///
    /// # Errors
    ///
    /// Returns the store's error if a write fails.
    pub async fn store(&self, options: &dyn OptionStore) -> Result<(), RepositoryError> {
        set_typed(options, keys::HOST_INI, &self.ini).await?;
        set_typed(options, keys::ACTIVE_PLUGINS, &self.active_plugins).await?;
        set_typed(options, keys::HOST_OPTIONS, &self.options).await?;
        match &self.localization {
            Some(settings) => set_typed(options, keys::QTRANSLATE_CONFIG, settings).await?,
            None => {
                options.delete(keys::QTRANSLATE_CONFIG).await?;
            }
        }
        tracing::info!(
            ini_values = self.ini.len(),
            active_plugins = self.active_plugins.len(),
            options = self.options.len(),
            "Stored host environment report"
        );
        Ok(())
    }
}

/// [`HostEnvironment`] backed by the last stored [`HostReport`].
#[derive(Clone)]
pub struct StoredHostEnvironment {
    options: Arc<dyn OptionStore>,
}

impl StoredHostEnvironment {
    #[must_use]
    pub fn new(options: Arc<dyn OptionStore>) -> Self {
        Self { options }
    }
}

#[async_trait]
impl HostEnvironment for StoredHostEnvironment {
    async fn ini_values(&self) -> Result<HashMap<String, String>, RepositoryError> {
        let raw: HashMap<String, JsonValue> =
            get_typed(self.options.as_ref(), keys::HOST_INI)
                .await?
                .unwrap_or_default();

        Ok(raw
            .into_iter()
            .filter_map(|(name, value)| {
                let text = match value {
                    JsonValue::String(s) => s,
                    JsonValue::Number(n) => n.to_string(),
                    JsonValue::Bool(b) => if b { "1" } else { "" }.to_string(),
                    _ => return None,
                };
                Some((name, text))
            })
            .collect())
    }

    async fn active_plugins(&self) -> Result<HashSet<String>, RepositoryError> {
        let plugins: Vec<String> = get_typed(self.options.as_ref(), keys::ACTIVE_PLUGINS)
            .await?
            .unwrap_or_default();
        Ok(plugins.into_iter().collect())
    }

    async fn options(&self) -> Result<HashMap<String, JsonValue>, RepositoryError> {
        Ok(get_typed(self.options.as_ref(), keys::HOST_OPTIONS)
            .await?
            .unwrap_or_default())
    }

    async fn localization(&self) -> Result<Option<LocalizationSettings>, RepositoryError> {
        get_typed(self.options.as_ref(), keys::QTRANSLATE_CONFIG).await
    }
}
