//! WooCommerce webhooks delivering order and product events to Checkout POS.
//!
//! Webhooks are owned by WooCommerce; the connector only creates them after a
//! token grant and removes them on disconnect. Ownership is recognised by the
//! name prefix.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::instrument;
use url::Url;

use checkout_pos_core::WebhookId;

use crate::config::WooCommerceApiConfig;

/// Prefix shared by every webhook the connector creates.
pub const WEBHOOK_NAME_PREFIX: &str = "WooCommerce KIS";
/// Upper bound on webhooks removed in one disconnect.
pub const WEBHOOK_SEARCH_LIMIT: usize = 500;

const WEBHOOK_RESOURCES: [&str; 2] = ["order", "product"];
const WEBHOOK_EVENTS: [&str; 4] = ["created", "updated", "deleted", "restored"];
const WEBHOOK_API_VERSION: &str = "wp_api_v2";
const PAGE_SIZE: usize = 100;

/// Errors that can occur when managing webhooks.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// WooCommerce rejected the request.
    #[error("WooCommerce returned {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body could not be parsed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// The REST base URL is invalid.
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

/// A webhook to create.
#[derive(Clone)]
pub struct WebhookSpec {
    pub name: String,
    pub topic: String,
    pub delivery_url: String,
    pub secret: SecretString,
}

impl std::fmt::Debug for WebhookSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookSpec")
            .field("name", &self.name)
            .field("topic", &self.topic)
            .field("delivery_url", &self.delivery_url)
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// An existing webhook.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WebhookSummary {
    pub id: WebhookId,
    pub name: String,
}

/// Webhook management on the store.
#[async_trait]
pub trait WebhookRegistry: Send + Sync {
    /// Create an active webhook.
    async fn create(&self, spec: &WebhookSpec) -> Result<WebhookId, WebhookError>;

    /// Webhooks whose name contains `name`, at most `limit` of them.
    async fn search(&self, name: &str, limit: usize) -> Result<Vec<WebhookSummary>, WebhookError>;

    /// Permanently delete a webhook.
    async fn delete(&self, id: WebhookId) -> Result<(), WebhookError>;
}

/// The full set of webhooks for one merchant.
///
/// Every order and product lifecycle event is delivered to the same
/// endpoint, parameterised by domain and merchant id, and signed with the
/// OAuth application secret.
#[must_use]
pub fn webhook_plan(
    webhook_url: &str,
    domain: &str,
    merchant_id: Option<i64>,
    secret: &SecretString,
) -> Vec<WebhookSpec> {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("domain", domain)
        .append_pair(
            "merchant_id",
            &merchant_id.map(|id| id.to_string()).unwrap_or_default(),
        )
        .finish();
    let delivery_url = format!("{}/?{query}", webhook_url.trim_end_matches('/'));

    WEBHOOK_RESOURCES
        .iter()
        .flat_map(|resource| WEBHOOK_EVENTS.iter().map(move |event| (*resource, *event)))
        .map(|(resource, event)| WebhookSpec {
            name: format!(
                "{WEBHOOK_NAME_PREFIX} {} {}",
                capitalize(resource),
                capitalize(event)
            ),
            topic: format!("{resource}.{event}"),
            delivery_url: delivery_url.clone(),
            secret: secret.clone(),
        })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

// =============================================================================
// WooCommerce REST client
// =============================================================================

#[derive(Debug, Serialize)]
struct CreateWebhookRequest<'a> {
    name: &'a str,
    status: &'a str,
    topic: &'a str,
    delivery_url: &'a str,
    secret: &'a str,
    api_version: &'a str,
}

/// [`WebhookRegistry`] backed by the WooCommerce REST API (`wc/v3/webhooks`).
#[derive(Clone)]
pub struct WooWebhookClient {
    client: reqwest::Client,
    endpoint: Url,
    credentials: WooCommerceApiConfig,
}

impl WooWebhookClient {
    /// Create a client for the store at `rest_url`.
    ///
    /// # Errors
    ///
    /// Returns `WebhookError::Url` if the webhook endpoint cannot be derived.
    pub fn new(
        client: reqwest::Client,
        rest_url: &Url,
        credentials: WooCommerceApiConfig,
    ) -> Result<Self, WebhookError> {
        let endpoint = rest_url.join("wc/v3/webhooks")?;
        Ok(Self {
            client,
            endpoint,
            credentials,
        })
    }

    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request.basic_auth(
            &self.credentials.consumer_key,
            Some(self.credentials.consumer_secret.expose_secret()),
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, WebhookError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(WebhookError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl WebhookRegistry for WooWebhookClient {
    #[instrument(skip(self), fields(topic = %spec.topic))]
    async fn create(&self, spec: &WebhookSpec) -> Result<WebhookId, WebhookError> {
        let body = CreateWebhookRequest {
            name: &spec.name,
            status: "active",
            topic: &spec.topic,
            delivery_url: &spec.delivery_url,
            secret: spec.secret.expose_secret(),
            api_version: WEBHOOK_API_VERSION,
        };

        let response = self
            .authed(self.client.post(self.endpoint.clone()))
            .json(&body)
            .send()
            .await?;
        let bytes = Self::check(response).await?.bytes().await?;
        let created: WebhookSummary = serde_json::from_slice(&bytes)?;
        Ok(created.id)
    }

    #[instrument(skip(self))]
    async fn search(&self, name: &str, limit: usize) -> Result<Vec<WebhookSummary>, WebhookError> {
        let mut found = Vec::new();
        let mut page = 1;

        while found.len() < limit {
            let mut url = self.endpoint.clone();
            url.query_pairs_mut()
                .append_pair("search", name)
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());

            let response = self.authed(self.client.get(url)).send().await?;
            let bytes = Self::check(response).await?.bytes().await?;
            let batch: Vec<WebhookSummary> = serde_json::from_slice(&bytes)?;
            let exhausted = batch.len() < PAGE_SIZE;

            found.extend(batch.into_iter().filter(|hook| hook.name.contains(name)));
            if exhausted {
                break;
            }
            page += 1;
        }

        found.truncate(limit);
        Ok(found)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: WebhookId) -> Result<(), WebhookError> {
        let mut url = self.endpoint.join(&format!("webhooks/{id}"))?;
        url.query_pairs_mut().append_pair("force", "true");

        let response = self.authed(self.client.delete(url)).send().await?;
        Self::check(response).await?;
        Ok(())
    }
}

// =============================================================================
// In-memory registry
// =============================================================================

/// A webhook held by [`MemoryWebhookRegistry`].
#[derive(Debug, Clone)]
pub struct StoredWebhook {
    pub id: WebhookId,
    pub spec: WebhookSpec,
}

/// In-memory [`WebhookRegistry`] for tests and database-less runs.
#[derive(Debug, Default)]
pub struct MemoryWebhookRegistry {
    hooks: Mutex<Vec<StoredWebhook>>,
    next_id: Mutex<i64>,
    fail_topics: Mutex<Vec<String>>,
}

impl MemoryWebhookRegistry {
    /// Snapshot of the current webhooks.
    pub async fn all(&self) -> Vec<StoredWebhook> {
        self.hooks.lock().await.clone()
    }

    /// Make creation of webhooks with `topic` fail.
    pub async fn fail_on_topic(&self, topic: &str) {
        self.fail_topics.lock().await.push(topic.to_string());
    }
}

#[async_trait]
impl WebhookRegistry for MemoryWebhookRegistry {
    async fn create(&self, spec: &WebhookSpec) -> Result<WebhookId, WebhookError> {
        if self.fail_topics.lock().await.contains(&spec.topic) {
            return Err(WebhookError::Status {
                status: 400,
                body: format!("rejected topic {}", spec.topic),
            });
        }

        let mut next_id = self.next_id.lock().await;
        *next_id += 1;
        let id = WebhookId::new(*next_id);
        self.hooks.lock().await.push(StoredWebhook {
            id,
            spec: spec.clone(),
        });
        Ok(id)
    }

    async fn search(&self, name: &str, limit: usize) -> Result<Vec<WebhookSummary>, WebhookError> {
        Ok(self
            .hooks
            .lock()
            .await
            .iter()
            .filter(|hook| hook.spec.name.contains(name))
            .take(limit)
            .map(|hook| WebhookSummary {
                id: hook.id,
                name: hook.spec.name.clone(),
            })
            .collect())
    }

    async fn delete(&self, id: WebhookId) -> Result<(), WebhookError> {
        let mut hooks = self.hooks.lock().await;
        let before = hooks.len();
        hooks.retain(|hook| hook.id != id);
        if hooks.len() == before {
            return Err(WebhookError::Status {
                status: 404,
                body: format!("webhook {id} not found"),
            });
        }
        Ok(())
    }
}
