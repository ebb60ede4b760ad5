//! REST API key revocation.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use checkout_pos_core::ApiKeyId;

use crate::error::AppError;
use crate::middleware::RequireStoreManager;
use crate::state::AppState;

/// Build the token router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        &format!("{}/delete_auth_token", super::NAMESPACE),
        get(delete_auth_token),
    )
}

#[derive(Debug, Default, Deserialize)]
pub struct DeleteTokenQuery {
    pub token_id: Option<String>,
}

/// Response for a revocation.
#[derive(Debug, Serialize)]
pub struct DeleteTokenResponse {
    pub deleted: bool,
}

/// Revoke the WooCommerce API key Checkout POS was given.
///
/// GET /wp-json/wc/v3/delete_auth_token
#[instrument(skip(state, _user))]
async fn delete_auth_token(
    State(state): State<AppState>,
    RequireStoreManager(_user): RequireStoreManager,
    Query(query): Query<DeleteTokenQuery>,
) -> Result<Json<DeleteTokenResponse>, AppError> {
    let raw = query
        .token_id
        .ok_or_else(|| AppError::BadRequest("token_id is required".to_string()))?;
    let token_id: ApiKeyId = raw
        .parse()
        .map_err(|_| AppError::BadRequest(format!("invalid token_id: {raw}")))?;

    let deleted = state.api_keys().revoke(token_id).await?;
    tracing::info!(token_id = %token_id, deleted, "Revoked REST API key");
    Ok(Json(DeleteTokenResponse { deleted }))
}
