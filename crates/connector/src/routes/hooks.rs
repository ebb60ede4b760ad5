//! Signed event delivery from the host site.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Response},
    routing::post,
};
use tracing::instrument;

use crate::error::AppError;
use crate::hooks::{self, HookEvent};
use crate::middleware::auth::verify_body_signature;
use crate::state::AppState;

/// Build the hooks router.
pub fn router() -> Router<AppState> {
    Router::new().route("/kis/hooks", post(receive_hook))
}

/// Verify, parse and dispatch one host event.
///
/// POST /kis/hooks
#[instrument(skip_all)]
async fn receive_hook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    verify_body_signature(&state, &headers, &body)?;

    let event: HookEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid hook event: {e}")))?;

    let outcome = hooks::dispatch(&state, event).await?;
    if outcome.reload {
        Ok((AppendHeaders([("Refresh", "0")]), Json(outcome)).into_response())
    } else {
        Ok(Json(outcome).into_response())
    }
}
