//! Remote system audit configuration document.

use serde::Deserialize;
use serde_json::Value as JsonValue;

/// Checks to run, as published by Checkout POS per deployment.
///
/// Every section is optional; unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub ini_params: Vec<IniRequirement>,
    #[serde(default)]
    pub wp_options: Vec<OptionRequirement>,
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default)]
    pub mandatory_plugins: Vec<String>,
    #[serde(default)]
    pub incompatible_plugins: Vec<String>,
    /// Whether an active incompatible plugin is only a warning.
    #[serde(default = "default_pass_on_warning")]
    pub pass_audit_on_warning: bool,
    #[serde(default)]
    pub plugin_info: Vec<PluginInfo>,
}

const fn default_pass_on_warning() -> bool {
    true
}

/// Minimum for a PHP ini setting.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct IniRequirement {
    pub name: String,
    /// Megabytes for `memory_limit`, seconds for `max_execution_time`.
    pub limit: i64,
}

/// Required value of a store option.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OptionRequirement {
    pub name: String,
    pub value: JsonValue,
    /// Human-readable name of the setting.
    pub gui_name: String,
    /// Where the setting lives in the store admin.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub warn_only: bool,
}

/// Display metadata for a plugin identifier.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginInfo {
    pub plugin: String,
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub desc: Option<String>,
}

impl AuditConfig {
    /// Display metadata for `plugin`, if published.
    #[must_use]
    pub fn plugin_info(&self, plugin: &str) -> Option<&PluginInfo> {
        self.plugin_info.iter().find(|info| info.plugin == plugin)
    }

    /// How to name `plugin` in a message.
    #[must_use]
    pub fn plugin_display(&self, plugin: &str) -> String {
        match self.plugin_info(plugin) {
            Some(PluginInfo {
                name, url: Some(url), ..
            }) => format!("{name} ({url})"),
            Some(info) => info.name.clone(),
            None => plugin.to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config: AuditConfig = serde_json::from_str("{}").unwrap();
        assert!(config.pass_audit_on_warning);
        assert!(config.ini_params.is_empty());
        assert!(config.target_url.is_none());
    }

    #[test]
    fn test_full_document() {
        let config: AuditConfig = serde_json::from_str(
            r#"{
                "ini_params": [{"name": "memory_limit", "limit": 256}],
                "wp_options": [{
                    "name": "woocommerce_calc_taxes",
                    "value": "yes",
                    "gui_name": "Enable taxes",
                    "path": "WooCommerce > Settings > General",
                    "warn_only": true
                }],
                "target_url": "https://woocommerce.prod.op-kassa.fi/prod/ping",
                "mandatory_plugins": ["woocommerce/woocommerce.php"],
                "incompatible_plugins": ["cache/cache.php"],
                "pass_audit_on_warning": false,
                "plugin_info": [{
                    "plugin": "woocommerce/woocommerce.php",
                    "name": "WooCommerce",
                    "url": "https://wordpress.org/plugins/woocommerce/"
                }],
                "something_new": 1
            }"#,
        )
        .unwrap();

        assert_eq!(config.ini_params.len(), 1);
        assert!(config.wp_options.first().unwrap().warn_only);
        assert!(!config.pass_audit_on_warning);
        assert_eq!(
            config.plugin_display("woocommerce/woocommerce.php"),
            "WooCommerce (https://wordpress.org/plugins/woocommerce/)"
        );
        assert_eq!(config.plugin_display("cache/cache.php"), "cache/cache.php");
    }
}
