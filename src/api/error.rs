use axum::response::{IntoResponse, Response};
use thiserror::Error;

use super::response::ApiError;
use crate::identity::IdentityError;
use crate::storage::DatabaseError;
use crate::upload_service::UploadServiceError;

/// Failure taxonomy shared by every handler. Converted to a JSend `ApiError`
/// at the route boundary; upstream and persistence details are logged, not returned.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    Authentication,
    /// Covers both missing records and records owned by someone else.
    #[error("File not found")]
    NotFound,
    #[error("Upstream service failed: {0}")]
    Upstream(String),
    #[error("Persistence failed: {0}")]
    Persistence(#[from] DatabaseError),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    PayloadTooLarge(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<IdentityError> for AppError {
    fn from(e: IdentityError) -> Self {
        AppError::Upstream(e.to_string())
    }
}

impl From<UploadServiceError> for AppError {
    fn from(e: UploadServiceError) -> Self {
        match e {
            UploadServiceError::InvalidSignature => AppError::Authentication,
            other => AppError::Upstream(other.to_string()),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        match e {
            AppError::Authentication => ApiError::unauthorized("Authentication required"),
            AppError::NotFound => ApiError::not_found("File not found"),
            AppError::Validation(msg) => ApiError::bad_request(msg),
            AppError::PayloadTooLarge(msg) => ApiError::payload_too_large(msg),
            AppError::Conflict(msg) => ApiError::conflict(msg),
            AppError::Upstream(detail) => {
                tracing::error!(error = %detail, "Upstream service call failed");
                ApiError::bad_gateway("Upstream service unavailable")
            }
            AppError::Persistence(err) => {
                tracing::error!(error = %err, "Persistence failure");
                ApiError::internal("Internal server error")
            }
            AppError::Internal(detail) => {
                tracing::error!(error = %detail, "Internal failure");
                ApiError::internal("Internal server error")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        ApiError::from(self).into_response()
    }
}
