//! HTTP route handlers for the connector.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                               - Liveness check
//! GET  /health/ready                         - Readiness check (option store)
//!
//! # Settings page (host-signed admin requests)
//! GET  /kis                                  - Settings page, runs callback commands
//! GET  /kis/connect                          - Redirect to Checkout POS authorization
//! GET  /kis/connect/woocommerce              - Register OAuth application, redirect
//! POST /kis/settings                         - Save the settings form
//! POST /kis/activate                         - Activate and run the system audit
//! POST /kis/deactivate                       - Deactivate and drop the connection
//!
//! # Host events (body signature)
//! POST /kis/hooks                            - Dispatch a host event
//!
//! # WooCommerce REST extensions (manage_woocommerce)
//! GET  /wp-json/wc/v3/deleted_products       - Deleted product feed
//! GET  /wp-json/wc/v3/delete_auth_token      - Revoke a REST API key
//! ```

pub mod api;
pub mod hooks;
pub mod settings;

use axum::{Router, extract::State, http::StatusCode, routing::get};

use crate::db::keys;
use crate::state::AppState;

/// Build the complete router, without state or outer layers.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(settings::router())
        .merge(hooks::router())
        .merge(api::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the option store cannot be read.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match state.options().get(keys::PLUGIN_ACTIVE).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::warn!(error = %e, "Option store not ready");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
