use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::{
    dao::storage::StorageError,
    state::{ledger::ApplyError, lifecycle::InvalidTransition},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// The caller does not own the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Wallet balance too low for the operation.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        ServiceError::Unavailable(err)
    }
}

impl From<InvalidTransition> for ServiceError {
    fn from(err: InvalidTransition) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<ApplyError> for ServiceError {
    fn from(err: ApplyError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Not enough credits or points.
    #[error("payment required: {0}")]
    PaymentRequired(String),
    /// Caller may not act on the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Forbidden(message) => AppError::Forbidden(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::InsufficientFunds(message) => AppError::PaymentRequired(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
        }
    }
}

/// JSON body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    /// Human readable description of the failure.
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PaymentRequired(_) => StatusCode::PAYMENT_REQUIRED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_http_statuses() {
        let cases = [
            (ServiceError::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (
                ServiceError::InsufficientFunds("x".into()),
                StatusCode::PAYMENT_REQUIRED,
            ),
            (ServiceError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ServiceError::InvalidState("x".into()), StatusCode::CONFLICT),
            (ServiceError::Degraded, StatusCode::SERVICE_UNAVAILABLE),
            (ServiceError::Timeout, StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (err, status) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
