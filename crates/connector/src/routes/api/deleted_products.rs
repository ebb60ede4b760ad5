//! Deleted product feed.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use checkout_pos_core::ProductId;

use crate::db::DeletedProductRepository;
use crate::error::AppError;
use crate::middleware::RequireStoreManager;
use crate::state::AppState;

/// Build the deleted products router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        &format!("{}/deleted_products", super::NAMESPACE),
        get(list_deleted_products),
    )
}

/// Query for the deleted product feed.
#[derive(Debug, Default, Deserialize)]
pub struct DeletedProductsQuery {
    pub deleted_after: Option<String>,
}

impl DeletedProductsQuery {
    /// Lower bound in unix seconds. Empty and `0` mean no bound.
    fn lower_bound(&self) -> Result<Option<i64>, AppError> {
        let Some(raw) = self.deleted_after.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if raw.is_empty() {
            return Ok(None);
        }
        let after: i64 = raw
            .parse()
            .map_err(|_| AppError::BadRequest(format!("invalid deleted_after: {raw}")))?;
        Ok((after != 0).then_some(after))
    }
}

/// Products deleted since `deleted_after`, keyed by id.
///
/// GET /wp-json/wc/v3/deleted_products
#[instrument(skip(state, _user))]
async fn list_deleted_products(
    State(state): State<AppState>,
    RequireStoreManager(_user): RequireStoreManager,
    Query(query): Query<DeletedProductsQuery>,
) -> Result<Json<BTreeMap<ProductId, i64>>, AppError> {
    let after = query.lower_bound()?;
    let deleted = DeletedProductRepository::new(state.options())
        .list(after)
        .await?;
    tracing::debug!(count = deleted.len(), "Listed deleted products");
    Ok(Json(deleted))
}
