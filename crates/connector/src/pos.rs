//! Checkout POS backend client.
//!
//! The connector makes three kinds of calls to Checkout POS: telling it to
//! drop the link on a forced disconnect, fetching the system audit
//! configuration, and probing connectivity. All are single-attempt; callers
//! log failures and carry on.

use async_trait::async_trait;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::audit::AuditConfig;

/// Errors that can occur when calling Checkout POS.
#[derive(Debug, Error)]
pub enum PosError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote side answered with an error status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// The audit configuration document is malformed.
    #[error("invalid audit configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),

    /// An endpoint URL could not be parsed.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// Calls the connector makes to Checkout POS.
#[async_trait]
pub trait PosBackend: Send + Sync {
    /// Ask Checkout POS to drop the link for `domain`.
    async fn revoke_link(&self, delete_url: &str, domain: &str) -> Result<(), PosError>;

    /// Fetch the system audit configuration document.
    async fn fetch_audit_config(&self, url: &str) -> Result<AuditConfig, PosError>;

    /// Check that `url` answers with a non-error status.
    async fn probe(&self, url: &str) -> Result<(), PosError>;
}

/// `reqwest`-based [`PosBackend`].
#[derive(Clone)]
pub struct HttpPosBackend {
    client: reqwest::Client,
}

impl HttpPosBackend {
    /// Share an existing HTTP client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PosBackend for HttpPosBackend {
    #[instrument(skip(self))]
    async fn revoke_link(&self, delete_url: &str, domain: &str) -> Result<(), PosError> {
        let mut url = Url::parse(delete_url)?;
        url.query_pairs_mut().append_pair("domain", domain);

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(PosError::Status(status.as_u16()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_audit_config(&self, url: &str) -> Result<AuditConfig, PosError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PosError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let document: serde_json::Value = serde_json::from_slice(&body)?;
        if !document.is_object() {
            return Err(PosError::InvalidConfig(serde::de::Error::custom(
                "expected a JSON object",
            )));
        }
        Ok(serde_json::from_value(document)?)
    }

    #[instrument(skip(self))]
    async fn probe(&self, url: &str) -> Result<(), PosError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(PosError::Status(status.as_u16()));
        }
        Ok(())
    }
}
