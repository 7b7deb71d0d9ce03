use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::simulation::error::SimulationError;
use crate::store::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Transient failure; the same request may succeed later.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<SimulationError> for AppError {
    fn from(e: SimulationError) -> Self {
        let message = e.to_string();
        if let SimulationError::Timeout { .. } = e {
            return AppError::Timeout(message);
        }
        if e.is_retryable() {
            return AppError::Unavailable(message);
        }
        match e {
            SimulationError::SimulationNotFound(_) | SimulationError::SessionNotFound(_) => {
                AppError::NotFound(message)
            }
            SimulationError::InvalidRoundIndex { .. } | SimulationError::InvalidRequest(_) => {
                AppError::Validation(message)
            }
            SimulationError::InvalidTransition { .. } => AppError::Conflict(message),
            SimulationError::Store(inner) => AppError::Store(inner),
            // Retryable variants returned above.
            other => AppError::Unavailable(other.to_string()),
        }
    }
}

impl AppError {
    fn retryable(&self) -> bool {
        matches!(self, AppError::Unavailable(_) | AppError::Timeout(_))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.retryable();
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Unavailable(msg) => {
                tracing::warn!("Retryable failure: {msg}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "RETRYABLE_ERROR",
                    msg.clone(),
                )
            }
            AppError::Timeout(msg) => {
                tracing::warn!("Timeout: {msg}");
                (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg.clone())
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message,
                "retryable": retryable
            }
        }));

        (status, body).into_response()
    }
}
