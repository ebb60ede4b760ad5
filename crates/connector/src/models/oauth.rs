//! WooCommerce-side OAuth application registered for Checkout POS.

use rand::Rng;
use rand::distr::Alphanumeric;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const CONSUMER_KEY_LENGTH: usize = 12;
const CONSUMER_SECRET_LENGTH: usize = 48;

/// OAuth client credentials handed to Checkout POS.
///
/// The consumer secret doubles as the signing secret of every webhook.
/// Implements `Debug` manually to redact it.
#[derive(Clone)]
pub struct OAuthApplication {
    pub consumer_key: String,
    pub consumer_secret: SecretString,
    /// Where the OAuth server sends the token grant.
    pub callback_url: String,
}

impl std::fmt::Debug for OAuthApplication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthApplication")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"[REDACTED]")
            .field("callback_url", &self.callback_url)
            .finish()
    }
}

impl OAuthApplication {
    /// Generate fresh credentials.
    #[must_use]
    pub fn generate(callback_url: String) -> Self {
        Self {
            consumer_key: random_token(CONSUMER_KEY_LENGTH),
            consumer_secret: SecretString::from(random_token(CONSUMER_SECRET_LENGTH)),
            callback_url,
        }
    }
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

/// Stored form of [`OAuthApplication`].
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct OAuthApplicationRecord {
    consumer_key: String,
    consumer_secret: String,
    callback_url: String,
}

impl From<&OAuthApplication> for OAuthApplicationRecord {
    fn from(app: &OAuthApplication) -> Self {
        Self {
            consumer_key: app.consumer_key.clone(),
            consumer_secret: app.consumer_secret.expose_secret().to_string(),
            callback_url: app.callback_url.clone(),
        }
    }
}

impl From<OAuthApplicationRecord> for OAuthApplication {
    fn from(record: OAuthApplicationRecord) -> Self {
        Self {
            consumer_key: record.consumer_key,
            consumer_secret: SecretString::from(record.consumer_secret),
            callback_url: record.callback_url,
        }
    }
}
