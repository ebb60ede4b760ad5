//! WooCommerce REST extensions used by Checkout POS.
//!
//! Both endpoints live under the store's `wc/v3` namespace and require the
//! `manage_woocommerce` capability.

pub mod deleted_products;
pub mod tokens;

use axum::Router;

use crate::state::AppState;

/// REST namespace shared with WooCommerce.
pub const NAMESPACE: &str = "/wp-json/wc/v3";

/// Build the complete API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(deleted_products::router())
        .merge(tokens::router())
}
