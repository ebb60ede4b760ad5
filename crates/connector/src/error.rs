//! Unified error handling for the connector's HTTP surface.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::connection::ConnectionError;
use crate::db::RepositoryError;

/// Application-level error type for request handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// A connection operation failed.
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request is not signed by the host site.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<askama::Error> for AppError {
    fn from(e: askama::Error) -> Self {
        Self::Internal(format!("template rendering failed: {e}"))
    }
}

impl AppError {
    const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Connection(ConnectionError::Repository(_) | ConnectionError::InvalidEndpoint(_))
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Connection(e) => match e {
                ConnectionError::PermissionDenied => StatusCode::FORBIDDEN,
                ConnectionError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                ConnectionError::NotConnected
                | ConnectionError::MissingApplication
                | ConnectionError::Inactive => StatusCode::CONFLICT,
                ConnectionError::InvalidEndpoint(_) | ConnectionError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Connector request error"
            );
        }

        let status = self.status();

        // Don't expose internal error details to clients
        let message = if self.is_server_error() {
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, message).into_response()
    }
}

/// Set the Sentry user context for the acting store user.
pub fn set_sentry_user(user_id: i64, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("webhook 12".to_string());
        assert_eq!(err.to_string(), "Not found: webhook 12");

        let err = AppError::BadRequest("invalid token_id".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid token_id");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_connection_error_status_codes() {
        assert_eq!(
            get_status(ConnectionError::PermissionDenied.into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ConnectionError::Inactive.into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(
                ConnectionError::InvalidPayload(checkout_pos_core::MerchantError::MissingOwnerEmail)
                    .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ConnectionError::Repository(RepositoryError::NotFound).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
