//! Host-signed request authentication.
//!
//! The connector sits behind the store's admin. The host site forwards each
//! admin request with the acting user's id in `X-Kis-User` and an
//! HMAC-SHA256 over method, path and user id in `X-Kis-Signature`, keyed
//! with the shared secret. Hook deliveries sign the raw body instead.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, Method, request::Parts},
};
use hmac::{Hmac, Mac};
use secrecy::ExposeSecret;
use sha2::Sha256;

use checkout_pos_core::UserId;

use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::state::AppState;

pub const USER_HEADER: &str = "x-kis-user";
pub const SIGNATURE_HEADER: &str = "x-kis-signature";

type HmacSha256 = Hmac<Sha256>;

/// Hex HMAC-SHA256 of `message` under `secret`.
#[must_use]
pub fn sign(secret: &[u8], message: &[u8]) -> String {
    // HMAC accepts keys of any length.
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return String::new();
    };
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

/// Check a hex signature in constant time.
#[must_use]
pub fn verify_signature(secret: &[u8], message: &[u8], provided_hex: &str) -> bool {
    let Ok(provided) = hex::decode(provided_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&provided).is_ok()
}

/// What the host signs for an admin request.
#[must_use]
pub fn request_message(method: &Method, path_and_query: &str, user_id: UserId) -> String {
    format!("{method}\n{path_and_query}\n{user_id}")
}

/// Verify `X-Kis-Signature` over a hook body.
///
/// # Errors
///
/// Returns `AppError::Unauthorized` if the header is missing or wrong.
pub fn verify_body_signature(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), AppError> {
    let provided = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing signature".to_string()))?;

    let secret = state.config().shared_secret.expose_secret().as_bytes();
    if verify_signature(secret, body, provided) {
        Ok(())
    } else {
        tracing::warn!("Rejected hook with invalid signature");
        Err(AppError::Unauthorized("invalid signature".to_string()))
    }
}

async fn signed_user(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(raw_id) = parts.headers.get(USER_HEADER) else {
        return Ok(None);
    };
    let user_id: UserId = raw_id
        .to_str()
        .ok()
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| AppError::Unauthorized("malformed user header".to_string()))?;

    let provided = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing signature".to_string()))?;

    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path(), |pq| pq.as_str());
    let message = request_message(&parts.method, path_and_query, user_id);
    let secret = state.config().shared_secret.expose_secret().as_bytes();
    if !verify_signature(secret, message.as_bytes(), provided) {
        tracing::warn!(user_id = %user_id, "Rejected request with invalid signature");
        return Err(AppError::Unauthorized("invalid signature".to_string()));
    }

    let user = state.users().find(user_id).await?;
    if let Some(user) = &user {
        set_sentry_user(user.id.as_i64(), Some(&user.email));
    }
    Ok(user)
}

/// Extractor for the signed acting user, if any.
///
/// A request without `X-Kis-User` is anonymous; a request with a bad
/// signature is rejected.
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(Self(signed_user(parts, state).await?))
    }
}

/// Extractor that requires a signed, existing user.
pub struct RequireUser(pub User);

impl FromRequestParts<AppState> for RequireUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        signed_user(parts, state)
            .await?
            .map(Self)
            .ok_or_else(|| AppError::Unauthorized("not logged in".to_string()))
    }
}

/// Extractor that requires the `manage_woocommerce` capability.
pub struct RequireStoreManager(pub User);

impl FromRequestParts<AppState> for RequireStoreManager {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = signed_user(parts, state)
            .await?
            .ok_or_else(|| AppError::Forbidden("manage_woocommerce required".to_string()))?;
        if !user.can_manage_connection() {
            return Err(AppError::Forbidden(
                "manage_woocommerce required".to_string(),
            ));
        }
        Ok(Self(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"kq8Zr2VtW4mXyP9sLbN3cH7dJfG5hT1e";

    #[test]
    fn test_sign_and_verify() {
        let signature = sign(SECRET, b"{\"event\":\"init\"}");
        assert_eq!(signature.len(), 64);
        assert!(verify_signature(SECRET, b"{\"event\":\"init\"}", &signature));
    }

    #[test]
    fn test_tampered_body_is_rejected() {
        let signature = sign(SECRET, b"{\"event\":\"init\"}");
        assert!(!verify_signature(SECRET, b"{\"event\":\"activate\"}", &signature));
        assert!(!verify_signature(b"other-secret", b"{\"event\":\"init\"}", &signature));
    }

    #[test]
    fn test_malformed_signature_is_rejected() {
        assert!(!verify_signature(SECRET, b"body", "not-hex"));
        assert!(!verify_signature(SECRET, b"body", ""));
    }

    #[test]
    fn test_request_message() {
        let message = request_message(&Method::GET, "/kis?sys_audit=1", UserId::new(3));
        assert_eq!(message, "GET\n/kis?sys_audit=1\n3");
    }
}
