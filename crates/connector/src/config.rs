//! Connector configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `KIS_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `KIS_BASE_URL` - Public URL of the connector admin (settings page lives at `/kis`)
//! - `KIS_SITE_URL` - URL of the WooCommerce store this connector serves
//! - `KIS_SHARED_SECRET` - Secret the host site signs requests with (min 32 chars, high entropy)
//! - `WOO_CONSUMER_KEY` - WooCommerce REST API consumer key (webhook management)
//! - `WOO_CONSUMER_SECRET` - WooCommerce REST API consumer secret
//!
//! ## Optional
//! - `KIS_HOST` - Bind address (default: 127.0.0.1)
//! - `KIS_PORT` - Listen port (default: 3002)
//! - `KIS_REST_URL` - Store REST base (default: `{KIS_SITE_URL}/wp-json/`)
//! - `KIS_HTTP_TIMEOUT_SECS` - Timeout for outbound HTTP calls (default: 30)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//!
//! ## Optional (Checkout POS endpoint overrides)
//! - `KIS_WOOCOMMERCE_OAUTH_URL`
//! - `KIS_KASSA_OAUTH_URL`
//! - `KIS_KASSA_DELETE_OAUTH_URL`
//! - `KIS_WOOCOMMERCE_OAUTH_CALLBACK_URL`
//! - `KIS_WOOCOMMERCE_WEBHOOK_URL`
//! - `KIS_SYSTEM_AUDIT_CONFIG_URL`
//!
//! ## Optional (TLS)
//! - `KIS_TLS_CERT` - PEM-encoded certificate chain
//! - `KIS_TLS_KEY` - PEM-encoded private key

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use url::Url;

const MIN_SHARED_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Connector configuration.
#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the connector admin
    pub base_url: Url,
    /// The store's site URL; its host is the "local domain"
    pub site_url: Url,
    /// The store's REST API base
    pub rest_url: Url,
    /// Secret used to verify host-signed requests
    pub shared_secret: SecretString,
    /// WooCommerce REST credentials
    pub woocommerce: WooCommerceApiConfig,
    /// Explicit Checkout POS endpoint URLs
    pub endpoint_overrides: EndpointOverrides,
    /// Timeout applied to every outbound HTTP call
    pub http_timeout: Duration,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
    /// TLS configuration for HTTPS (optional)
    pub tls: Option<TlsConfig>,
}

/// WooCommerce REST API credentials.
///
/// Implements `Debug` manually to redact the consumer secret.
#[derive(Clone)]
pub struct WooCommerceApiConfig {
    pub consumer_key: String,
    pub consumer_secret: SecretString,
}

impl std::fmt::Debug for WooCommerceApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WooCommerceApiConfig")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .finish()
    }
}

impl WooCommerceApiConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            consumer_key: get_required_env("WOO_CONSUMER_KEY")?,
            consumer_secret: get_validated_secret("WOO_CONSUMER_SECRET")?,
        })
    }
}

/// Explicit endpoint URLs that replace the environment defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointOverrides {
    pub woo_oauth_url: Option<String>,
    pub kassa_oauth_url: Option<String>,
    pub kassa_delete_oauth_url: Option<String>,
    pub woo_oauth_callback_url: Option<String>,
    pub webhook_url: Option<String>,
    pub system_audit_config_url: Option<String>,
}

impl EndpointOverrides {
    fn from_env() -> Self {
        Self {
            woo_oauth_url: get_optional_env("KIS_WOOCOMMERCE_OAUTH_URL"),
            kassa_oauth_url: get_optional_env("KIS_KASSA_OAUTH_URL"),
            kassa_delete_oauth_url: get_optional_env("KIS_KASSA_DELETE_OAUTH_URL"),
            woo_oauth_callback_url: get_optional_env("KIS_WOOCOMMERCE_OAUTH_CALLBACK_URL"),
            webhook_url: get_optional_env("KIS_WOOCOMMERCE_WEBHOOK_URL"),
            system_audit_config_url: get_optional_env("KIS_SYSTEM_AUDIT_CONFIG_URL"),
        }
    }

    /// Whether the deployment points at a custom backend.
    ///
    /// Only the handshake and delivery endpoints count; overriding just the
    /// audit config or the delete endpoint keeps the environment label.
    #[must_use]
    pub const fn is_custom(&self) -> bool {
        self.woo_oauth_url.is_some()
            || self.kassa_oauth_url.is_some()
            || self.woo_oauth_callback_url.is_some()
            || self.webhook_url.is_some()
    }
}

/// TLS configuration for HTTPS.
#[derive(Clone)]
pub struct TlsConfig {
    /// PEM-encoded certificate chain
    pub cert_pem: String,
    /// PEM-encoded private key
    pub key_pem: SecretString,
}

impl std::fmt::Debug for TlsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsConfig")
            .field("cert_pem", &"[CERTIFICATE]")
            .field("key_pem", &"[REDACTED]")
            .finish()
    }
}

impl TlsConfig {
    fn from_env() -> Result<Option<Self>, ConfigError> {
        let cert_pem = get_optional_env("KIS_TLS_CERT");
        let key_pem = get_optional_env("KIS_TLS_KEY");

        match (cert_pem, key_pem) {
            (Some(cert), Some(key)) => Ok(Some(Self {
                cert_pem: cert,
                key_pem: SecretString::from(key),
            })),
            (None, None) => Ok(None),
            _ => Err(ConfigError::InvalidEnvVar(
                "KIS_TLS_*".to_string(),
                "Both KIS_TLS_CERT and KIS_TLS_KEY must be set together".to_string(),
            )),
        }
    }
}

impl ConnectorConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let database_url = get_database_url("KIS_DATABASE_URL")?;
        let host = get_env_or_default("KIS_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("KIS_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("KIS_PORT", "3002")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("KIS_PORT".to_string(), e.to_string()))?;
        let base_url = get_required_url("KIS_BASE_URL")?;
        let site_url = get_required_url("KIS_SITE_URL")?;
        let rest_url = match get_optional_env("KIS_REST_URL") {
            Some(raw) => with_trailing_slash(parse_url("KIS_REST_URL", &raw)?),
            None => default_rest_url(&site_url)?,
        };
        let shared_secret = get_validated_secret("KIS_SHARED_SECRET")?;
        validate_shared_secret(&shared_secret, "KIS_SHARED_SECRET")?;

        let woocommerce = WooCommerceApiConfig::from_env()?;
        let endpoint_overrides = EndpointOverrides::from_env();
        let http_timeout = Duration::from_secs(
            get_optional_env("KIS_HTTP_TIMEOUT_SECS")
                .map(|s| s.parse::<u64>())
                .transpose()
                .map_err(|e| {
                    ConfigError::InvalidEnvVar("KIS_HTTP_TIMEOUT_SECS".to_string(), e.to_string())
                })?
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_sample_rate = get_optional_env("SENTRY_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);
        let tls = TlsConfig::from_env()?;

        Ok(Self {
            database_url,
            host,
            port,
            base_url,
            site_url,
            rest_url,
            shared_secret,
            woocommerce,
            endpoint_overrides,
            http_timeout,
            sentry_dsn,
            sentry_environment,
            sentry_sample_rate,
            sentry_traces_sample_rate,
            tls,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Host component of the store URL.
    #[must_use]
    pub fn site_domain(&self) -> String {
        self.site_url.host_str().unwrap_or_default().to_string()
    }

    /// Absolute URL of the settings page.
    #[must_use]
    pub fn settings_url(&self) -> Url {
        let mut url = self.base_url.clone();
        url.set_path("/kis");
        url.set_query(None);
        url
    }
}

/// `{site_url}/wp-json/`, keeping any sub-directory install path.
fn default_rest_url(site_url: &Url) -> Result<Url, ConfigError> {
    with_trailing_slash(site_url.clone())
        .join("wp-json/")
        .map_err(|e| ConfigError::InvalidEnvVar("KIS_SITE_URL".to_string(), e.to_string()))
}

/// Relative joins replace the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as an absolute URL.
fn get_required_url(key: &str) -> Result<Url, ConfigError> {
    let value = get_required_env(key)?;
    parse_url(key, &value)
}

fn parse_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    Url::parse(value).map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    if let Ok(value) = std::env::var(primary_key) {
        return Ok(SecretString::from(value));
    }
    if let Ok(value) = std::env::var("DATABASE_URL") {
        return Ok(SecretString::from(value));
    }
    Err(ConfigError::MissingEnvVar(primary_key.to_string()))
}

/// Get an optional environment variable. Empty values count as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Validate that the shared secret meets minimum length requirements.
fn validate_shared_secret(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SHARED_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SHARED_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}
