//! HTTP middleware for the connector.
//!
//! # Layer Order (bottom to top in Router)
//!
//! 1. Sentry layers (capture errors, outermost)
//! 2. `TraceLayer` (request tracing)
//! 3. Security headers
//!
//! Authentication is per-route through the extractors in [`auth`].

pub mod auth;

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

pub use auth::{CurrentUser, RequireStoreManager, RequireUser};

/// Add security headers to every response.
pub async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(
        "Content-Security-Policy",
        HeaderValue::from_static("default-src 'self'; style-src 'self' 'unsafe-inline'"),
    );

    response
}
