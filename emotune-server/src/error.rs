//! HTTP error type
//!
//! Every handler returns [`ApiResult`]; library errors convert into
//! [`ApiError`] and render as `{"message": ...}` bodies, except the
//! "no music for this mood" outcome which carries the mood.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use emotune_common::api::AuthError;
use emotune_common::Emotion;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::emotion::{ClassifierError, InvalidImageError};
use crate::storage::StorageError;

/// Message returned for every token problem
pub const INVALID_TOKEN_MESSAGE: &str = "Missing or invalid token";

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400
    #[error("{0}")]
    BadRequest(String),

    /// 401
    #[error("{0}")]
    Unauthorized(String),

    /// 403
    #[error("{0}")]
    Forbidden(String),

    /// 404
    #[error("{0}")]
    NotFound(String),

    /// 404 with the detected mood as payload
    #[error("No music found for mood {0}")]
    NoMusicForMood(Emotion),

    /// 409
    #[error("{0}")]
    Conflict(String),

    /// 500
    #[error("{0}")]
    Internal(String),
}

impl From<emotune_common::Error> for ApiError {
    fn from(err: emotune_common::Error) -> Self {
        use emotune_common::Error;
        match err {
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Conflict(msg) => ApiError::Conflict(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<InvalidImageError> for ApiError {
    fn from(err: InvalidImageError) -> Self {
        ApiError::BadRequest(format!("Image preprocessing failed: {}", err))
    }
}

impl From<ClassifierError> for ApiError {
    fn from(err: ClassifierError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken | AuthError::InvalidToken(_) | AuthError::Expired => {
                ApiError::Unauthorized(INVALID_TOKEN_MESSAGE.to_string())
            }
            AuthError::InvalidKey(_) | AuthError::Hashing(_) | AuthError::LifetimeOutOfRange => {
                ApiError::Internal(err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NoMusicForMood(mood) => {
                let body = Json(json!({
                    "data": "No music found.",
                    "mood": mood,
                }));
                return (StatusCode::NOT_FOUND, body).into_response();
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    format!("An error occurred: {}", msg),
                )
            }
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
