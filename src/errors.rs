use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::{BookingStatus, TransitionError};

/// Failure of a booking use case. Every variant aborts the operation.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("professional does not offer {0}")]
    ServiceNotOffered(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("slot unavailable: {0}")]
    SlotUnavailable(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("cannot transition booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl From<TransitionError> for BookingError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::InvalidTransition { from, to } => {
                BookingError::InvalidTransition { from, to }
            }
            e @ TransitionError::Forbidden { .. } => BookingError::Forbidden(e.to_string()),
        }
    }
}

/// Failure of a best-effort side effect. Logged, never returned to callers.
#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("chat service: {0}")]
    Chat(String),

    #[error("notification service: {0}")]
    Notification(String),

    #[error("sms delivery: {0}")]
    Sms(String),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("booking cannot be cancelled: {0}")]
    NotCancellable(String),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(msg) => AppError::Validation(msg),
            e @ BookingError::ServiceNotOffered(_) => AppError::Validation(e.to_string()),
            BookingError::NotFound(msg) => AppError::NotFound(msg),
            BookingError::Forbidden(msg) => AppError::Forbidden(msg),
            e @ BookingError::SlotUnavailable(_) => AppError::Conflict(e.to_string()),
            e @ BookingError::Conflict(_) => AppError::Conflict(e.to_string()),
            e @ BookingError::InvalidTransition { .. } => AppError::InvalidTransition(e.to_string()),
            BookingError::Database(e) => AppError::Database(e),
            BookingError::Storage(e) => AppError::Internal(format!("{e:#}")),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::NotCancellable(_) => StatusCode::BAD_REQUEST,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string() });
        (status, axum::Json(body)).into_response()
    }
}
