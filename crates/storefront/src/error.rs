//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures errors to Sentry before
//! responding to the client. All route handlers should return `Result<T, AppError>`.
//!
//! Every error response has the same JSON shape:
//!
//! ```json
//! { "success": false, "kind": "invalid_argument", "message": "quantity must be at least 1" }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use forkful_core::{CommerceError, ErrorKind};
use serde_json::json;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::payment::GatewayError;

/// Application-level error type for the storefront.
#[derive(Debug, Error)]
pub enum AppError {
    /// A cart, catalog, ledger, gateway or identity operation failed.
    #[error("{0}")]
    Commerce(#[from] CommerceError),

    /// Authenticated, but not allowed to use this route.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request body or path could not be decoded.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        Self::Commerce(err.into())
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self::Commerce(err.into())
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Commerce(err) => match err.kind() {
                ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
                // Forged or mismatched payment callbacks are reported as bad input.
                ErrorKind::PermissionDenied | ErrorKind::InvalidArgument => {
                    StatusCode::BAD_REQUEST
                }
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::FailedPrecondition => StatusCode::CONFLICT,
                ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            },
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable kind reported in the `kind` field.
    #[must_use]
    pub fn kind(&self) -> String {
        match self {
            Self::Commerce(err) => err.kind().to_string(),
            Self::Forbidden(_) => "forbidden".to_string(),
            Self::BadRequest(_) => ErrorKind::InvalidArgument.to_string(),
            Self::Internal(_) => "internal".to_string(),
        }
    }

    fn is_server_error(&self) -> bool {
        match self {
            Self::Commerce(err) => err.is_retryable(),
            Self::Internal(_) => true,
            Self::Forbidden(_) | Self::BadRequest(_) => false,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Capture server errors to Sentry
        if self.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        let status = self.status_code();

        // Don't expose internal error details to clients
        let message = match &self {
            Self::Internal(_) => "Internal server error".to_string(),
            Self::Commerce(err) if err.is_retryable() => {
                "Service temporarily unavailable".to_string()
            }
            Self::Commerce(err) => err.message().to_string(),
            Self::Forbidden(msg) | Self::BadRequest(msg) => msg.clone(),
        };

        let body = json!({
            "success": false,
            "kind": self.kind(),
            "message": message,
        });

        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context for the authenticated subject.
///
/// Call this after successful authentication to associate errors with subjects.
pub fn set_sentry_user(subject_id: &impl ToString) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(subject_id.to_string()),
            ..Default::default()
        }));
    });
}

/// Add a breadcrumb for subject actions.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_commerce_status_codes() {
        assert_eq!(
            get_status(CommerceError::unauthenticated("no token").into()),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(CommerceError::permission_denied("bad signature").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CommerceError::invalid_argument("bad").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(CommerceError::not_found("order").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(CommerceError::failed_precondition("settled").into()),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(CommerceError::unavailable("db down").into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_boundary_status_codes() {
        assert_eq!(
            get_status(AppError::Forbidden("staff only".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("invalid json".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_body_carries_kind_and_message() {
        let body = body_json(CommerceError::not_found("order not found").into()).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["kind"], "not_found");
        assert_eq!(body["message"], "order not found");
    }

    #[tokio::test]
    async fn test_unavailable_hides_details() {
        let body =
            body_json(CommerceError::unavailable("connection refused to 10.0.0.3:5432").into())
                .await;
        assert_eq!(body["kind"], "unavailable");
        assert_eq!(body["message"], "Service temporarily unavailable");
    }
}
