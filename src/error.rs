//! Error taxonomy for driftfeed.
//!
//! Mirrors the Nova services' `error.rs` shape (a single `AppError` enum
//! implementing `actix_web::ResponseError`), specialized to the taxonomy in
//! spec.md §7: `Validation`, `AuthRequired`, `Conflict`, `NotFound`,
//! `UnsafeTarget`, `ExternalFailure`, `Transient`.

use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::Value;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("authentication required")]
    AuthRequired,

    /// Duplicate resource. Carries an optional JSON payload (e.g. the
    /// existing `LibraryEntry`) surfaced alongside the 409.
    #[error("conflict: {0}")]
    Conflict(String, Option<Value>),

    #[error("not found")]
    NotFound,

    /// SSRF guard rejection. Never reach the client with the raw reason —
    /// always surfaced as a generic `Validation` (see `error_response`).
    #[error("unsafe fetch target: {0}")]
    UnsafeTarget(String),

    #[error("upstream failure: {0}")]
    ExternalFailure(String),

    #[error("transient failure: {0}")]
    Transient(String),
}

impl AppError {
    pub fn conflict(msg: impl Into<String>) -> Self {
        AppError::Conflict(msg.into(), None)
    }

    pub fn conflict_with(msg: impl Into<String>, payload: Value) -> Self {
        AppError::Conflict(msg.into(), Some(payload))
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::UnsafeTarget(_) => StatusCode::BAD_REQUEST,
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::Conflict(..) => StatusCode::CONFLICT,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::ExternalFailure(_) => StatusCode::BAD_GATEWAY,
            AppError::Transient(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        match self {
            AppError::UnsafeTarget(_) => HttpResponse::build(status).json(serde_json::json!({
                "error": "invalid url",
            })),
            AppError::Conflict(msg, Some(payload)) => {
                HttpResponse::build(status).json(serde_json::json!({
                    "error": msg,
                    "link": payload,
                }))
            }
            other => HttpResponse::build(status).json(serde_json::json!({
                "error": other.to_string(),
            })),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound,
            other => AppError::Transient(other.to_string()),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::ExternalFailure(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Transient(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
