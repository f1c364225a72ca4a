use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::auth::session::clear_session_cookie;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Bad credentials, or a session that no longer resolves to a user.
    #[error("Authentication failed")]
    AuthenticationFailed,

    #[error("Permission denied")]
    PermissionDenied,

    #[error("Content not found")]
    ContentNotFound,

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Stored data violates an integrity rule; never retried.
    #[error("Malformed data: {0}")]
    MalformedData(String),

    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::AuthenticationFailed => {
                // The session is no longer trusted; make the client forget it.
                return (
                    StatusCode::UNAUTHORIZED,
                    [(header::SET_COOKIE, clear_session_cookie())],
                    "Authentication failed",
                )
                    .into_response();
            }
            AppError::PermissionDenied => (
                StatusCode::FORBIDDEN,
                "Only friends can access this content".to_string(),
            ),
            AppError::ContentNotFound => (
                StatusCode::NOT_FOUND,
                "The requested content does not exist".to_string(),
            ),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::MalformedData(msg) => {
                tracing::error!("Malformed data: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::SnapshotUnavailable(msg) => {
                tracing::warn!("Snapshot unavailable: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Cache snapshot unavailable".to_string(),
                )
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            AppError::Json(e) => {
                tracing::error!("JSON error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    fn response_status(err: AppError) -> StatusCode {
        let response = err.into_response();
        response.status()
    }

    #[test]
    fn authentication_failed_returns_401_and_clears_cookie() {
        let response = AppError::AuthenticationFailed.into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap();
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn permission_denied_returns_403() {
        assert_eq!(
            response_status(AppError::PermissionDenied),
            StatusCode::FORBIDDEN
        );
    }

    #[test]
    fn content_not_found_returns_404() {
        assert_eq!(
            response_status(AppError::ContentNotFound),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn bad_request_returns_400() {
        assert_eq!(
            response_status(AppError::BadRequest("oops".into())),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn malformed_data_returns_500() {
        assert_eq!(
            response_status(AppError::MalformedData("no separator".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn snapshot_unavailable_returns_503() {
        assert_eq!(
            response_status(AppError::SnapshotUnavailable("missing".into())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn internal_returns_500() {
        assert_eq!(
            response_status(AppError::Internal("boom".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
