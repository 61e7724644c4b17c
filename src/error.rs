use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// ApiError
///
/// The failure taxonomy shared by every handler and extractor. Each variant maps
/// to exactly one HTTP status and the `{ error: true, message }` body.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing, malformed, tampered or expired access token.
    #[error("unauthorized access")]
    Unauthorized,
    /// Authenticated caller is not allowed to touch the requested resource.
    #[error("forbidden access")]
    Forbidden,
    #[error("{0}")]
    BadRequest(String),
    /// The payment provider rejected the call or could not be reached.
    #[error("payment provider error: {0}")]
    PaymentProvider(String),
    #[error(transparent)]
    Store(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PaymentProvider(_) => StatusCode::BAD_GATEWAY,
            ApiError::Store(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

// Malformed client input. The rejection text names the offending field.

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Store and internal details stay in the logs.
        let message = match &self {
            ApiError::Store(e) => {
                tracing::error!(error = ?e, "data store operation failed");
                "internal server error".to_string()
            }
            ApiError::Internal(e) => {
                tracing::error!(error = %e, "internal error");
                "internal server error".to_string()
            }
            ApiError::PaymentProvider(e) => {
                tracing::warn!(error = %e, "payment provider call failed");
                "payment provider error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": true, "message": message }))).into_response()
    }
}
