use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::practice::models::SessionStatus;

/// Engine-level failures raised by the practice session state machine.
///
/// Only `ConfigValidation` and the defensive invariants are hard-blocking.
/// Collaborator failures (generation, device, scoring, persistence) have their
/// own error types and are recovered locally into notices.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Invalid session config: {0}")]
    ConfigValidation(String),

    #[error("Question index {index} is out of range for a deck of {len}")]
    OutOfRange { index: usize, len: usize },

    #[error("Session is finalized; no further changes are accepted")]
    SessionFinalized,

    #[error("No active session for this operation (status: {})", status.as_str())]
    NoActiveSession { status: SessionStatus },

    #[error("Question {0} is not part of this session")]
    UnknownQuestion(String),
}

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("User already has an active session: {0}")]
    SessionConflict(uuid::Uuid),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, code) = match &self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Session(err) => match err {
                SessionError::ConfigValidation(_) => {
                    (StatusCode::BAD_REQUEST, "CONFIG_VALIDATION_ERROR")
                }
                SessionError::OutOfRange { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "OUT_OF_RANGE")
                }
                SessionError::SessionFinalized => (StatusCode::CONFLICT, "SESSION_FINALIZED"),
                SessionError::NoActiveSession { .. } => {
                    (StatusCode::CONFLICT, "NO_ACTIVE_SESSION")
                }
                SessionError::UnknownQuestion(_) => (StatusCode::NOT_FOUND, "UNKNOWN_QUESTION"),
            },
            AppError::SessionConflict(_) => (StatusCode::CONFLICT, "SESSION_CONFLICT"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
