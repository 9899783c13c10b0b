use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use bioquest_core::errors::SourceError;
use bioquest_core::Error as CoreError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    /// A failed sync run. The client may trigger another one.
    #[error("{0}")]
    Sync(String),

    #[error("{message}")]
    Internal { message: String, retryable: bool },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: String,
    retryable: bool,
}

impl ApiError {
    fn parts(&self) -> (StatusCode, &'static str, bool) {
        match self {
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "validation_error", false),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized", false),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found", false),
            Self::Conflict(_) => (StatusCode::CONFLICT, "sync_in_flight", true),
            Self::RateLimited(_) => (StatusCode::TOO_MANY_REQUESTS, "rate_limited", true),
            Self::Sync(_) => (StatusCode::INTERNAL_SERVER_ERROR, "sync_failed", true),
            Self::Internal { retryable, .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", *retryable)
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        let retryable = err.is_retryable();
        match err {
            CoreError::Validation(msg) => Self::BadRequest(msg),
            CoreError::Unauthorized(msg) => Self::Unauthorized(msg),
            CoreError::NotFound(msg) => Self::NotFound(msg),
            CoreError::SyncInFlight(_) => Self::Conflict(err.to_string()),
            CoreError::Sync(_) => Self::Sync(err.to_string()),
            CoreError::Source(SourceError::Api { status: 429, .. }) => {
                Self::RateLimited(err.to_string())
            }
            other => Self::Internal {
                message: other.to_string(),
                retryable,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, retryable) = self.parts();
        if status.is_server_error() {
            error!("[Api] {}: {}", code, self);
        }
        let body = ErrorBody {
            code,
            message: self.to_string(),
            retryable,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bioquest_core::errors::DatabaseError;

    #[test]
    fn core_errors_map_to_status_codes() {
        let cases = [
            (CoreError::validation("bad"), StatusCode::BAD_REQUEST, false),
            (
                CoreError::Unauthorized("no session".into()),
                StatusCode::UNAUTHORIZED,
                false,
            ),
            (CoreError::not_found("job"), StatusCode::NOT_FOUND, false),
            (
                CoreError::SyncInFlight("u1".into()),
                StatusCode::CONFLICT,
                true,
            ),
            (
                CoreError::Source(SourceError::api(429, "slow down")),
                StatusCode::TOO_MANY_REQUESTS,
                true,
            ),
            (
                CoreError::sync("page 2 failed"),
                StatusCode::INTERNAL_SERVER_ERROR,
                true,
            ),
            (
                CoreError::Database(DatabaseError::QueryFailed("locked".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                true,
            ),
            (
                CoreError::Source(SourceError::InvalidResponse("html".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
                false,
            ),
        ];
        for (err, status, retryable) in cases {
            let (got_status, _, got_retryable) = ApiError::from(err).parts();
            assert_eq!((got_status, got_retryable), (status, retryable));
        }
    }

    #[tokio::test]
    async fn response_body_carries_code_and_retryable() {
        let response = ApiError::from(CoreError::SyncInFlight("u1".into())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "sync_in_flight");
        assert_eq!(body["retryable"], true);
        assert!(body["message"].as_str().unwrap().contains("u1"));
    }
}
