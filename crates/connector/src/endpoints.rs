//! Checkout POS endpoint resolution.
//!
//! Every remote URL is derived from the environment selection unless the
//! deployment overrides it explicitly. The result is cached on the
//! [`AppState`](crate::state::AppState) and only recomputed when the
//! environment guard reloads it.

use checkout_pos_core::Environment;

use crate::config::EndpointOverrides;

const WOO_OAUTH_PATH: &str = "woo-auth-initiate";
const KASSA_OAUTH_PATH: &str = "kassa-oauth-initiate";
const KASSA_DELETE_OAUTH_PATH: &str = "kassa-oauth-delete";
const WOO_OAUTH_CALLBACK_PATH: &str = "woo-auth-callback";
const WEBHOOK_PATH: &str = "woo-webhook";
const SYSTEM_AUDIT_CONFIG_PATH: &str = "wooClientSystemAuditConfig.json";

/// Resolved Checkout POS endpoint URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoints {
    pub environment: Environment,
    pub custom: bool,
    /// Starts the WooCommerce-side OAuth client flow.
    pub woo_oauth_url: String,
    /// Starts the Checkout POS OAuth flow (`beginConnect`).
    pub kassa_oauth_url: String,
    /// Tells Checkout POS to drop the link.
    pub kassa_delete_oauth_url: String,
    /// Callback registered on the local OAuth application.
    pub woo_oauth_callback_url: String,
    /// Shared delivery target for every webhook.
    pub webhook_url: String,
    /// JSON document describing the system audit checks.
    pub system_audit_config_url: String,
}

impl RemoteEndpoints {
    /// Resolve every endpoint for `environment`, letting overrides win.
    #[must_use]
    pub fn resolve(environment: Environment, overrides: &EndpointOverrides) -> Self {
        let base = environment.base_url();
        let pick = |explicit: &Option<String>, path: &str| {
            explicit
                .clone()
                .unwrap_or_else(|| format!("{base}{path}"))
        };

        Self {
            environment,
            custom: overrides.is_custom(),
            woo_oauth_url: pick(&overrides.woo_oauth_url, WOO_OAUTH_PATH),
            kassa_oauth_url: pick(&overrides.kassa_oauth_url, KASSA_OAUTH_PATH),
            kassa_delete_oauth_url: pick(&overrides.kassa_delete_oauth_url, KASSA_DELETE_OAUTH_PATH),
            woo_oauth_callback_url: pick(&overrides.woo_oauth_callback_url, WOO_OAUTH_CALLBACK_PATH),
            webhook_url: pick(&overrides.webhook_url, WEBHOOK_PATH),
            system_audit_config_url: pick(
                &overrides.system_audit_config_url,
                SYSTEM_AUDIT_CONFIG_PATH,
            ),
        }
    }

    /// Environment label for the settings page.
    #[must_use]
    pub fn label(&self) -> String {
        if self.custom {
            format!("CUSTOM ({})", self.kassa_oauth_url)
        } else {
            self.environment.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_defaults() {
        let endpoints = RemoteEndpoints::resolve(Environment::Production, &EndpointOverrides::default());
        assert_eq!(
            endpoints.kassa_oauth_url,
            "https://woocommerce.prod.op-kassa.fi/prod/kassa-oauth-initiate"
        );
        assert_eq!(
            endpoints.system_audit_config_url,
            "https://woocommerce.prod.op-kassa.fi/prod/wooClientSystemAuditConfig.json"
        );
        assert_eq!(endpoints.label(), "production");
    }

    #[test]
    fn test_test_environment_defaults() {
        let endpoints = RemoteEndpoints::resolve(Environment::Test, &EndpointOverrides::default());
        assert_eq!(
            endpoints.webhook_url,
            "https://woocommerce.qa.op-kassa.fi/qa/woo-webhook"
        );
        assert_eq!(
            endpoints.kassa_delete_oauth_url,
            "https://woocommerce.qa.op-kassa.fi/qa/kassa-oauth-delete"
        );
        assert_eq!(endpoints.label(), "test");
    }

    #[test]
    fn test_overrides_take_precedence_over_selection() {
        let overrides = EndpointOverrides {
            kassa_oauth_url: Some("http://localhost:9000/oauth".to_string()),
            ..EndpointOverrides::default()
        };

        for environment in [Environment::Production, Environment::Test] {
            let endpoints = RemoteEndpoints::resolve(environment, &overrides);
            assert_eq!(endpoints.kassa_oauth_url, "http://localhost:9000/oauth");
            assert!(endpoints.custom);
            assert!(endpoints.label().starts_with("CUSTOM"));
        }

        // Endpoints without an override still follow the selection.
        let endpoints = RemoteEndpoints::resolve(Environment::Test, &overrides);
        assert!(endpoints.webhook_url.starts_with("https://woocommerce.qa.op-kassa.fi/"));
    }
}
