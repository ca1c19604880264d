//! Error handling for the Manufacturing Order Workflow server
//!
//! Every error maps to a consistent JSON body: `{"error": {code, message, field?, details?}}`

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{GateReason, GateRejection, StageKey, StageStatus};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Workflow errors
    #[error("Stage gate rejected: {0}")]
    GateRejected(#[from] GateRejection),

    // Document store errors
    #[error("Storage error: {0}")]
    Storage(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<GateDetails>,
}

/// Itemized reasons attached to a gate rejection
#[derive(Serialize)]
pub struct GateDetails {
    pub stage: StageKey,
    pub target: StageStatus,
    pub reasons: Vec<GateReasonDetail>,
}

#[derive(Serialize)]
pub struct GateReasonDetail {
    pub message: String,
    #[serde(flatten)]
    pub reason: GateReason,
}

impl From<&GateRejection> for GateDetails {
    fn from(rejection: &GateRejection) -> Self {
        Self {
            stage: rejection.stage,
            target: rejection.target,
            reasons: rejection
                .reasons
                .iter()
                .map(|r| GateReasonDetail {
                    message: r.to_string(),
                    reason: r.clone(),
                })
                .collect(),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, errs)) => {
                let message = errs
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value for {}", field));
                AppError::Validation {
                    field: field.to_string(),
                    message,
                }
            }
            None => AppError::ValidationError(errors.to_string()),
        }
    }
}

impl AppError {
    fn detail(code: &str, message: String) -> ErrorDetail {
        ErrorDetail {
            code: code.to_string(),
            message,
            field: None,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..AppError::detail("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                AppError::detail("VALIDATION_ERROR", msg.clone()),
            ),
            AppError::DuplicateEntry(field) => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..AppError::detail(
                        "DUPLICATE_ENTRY",
                        format!("A record with this {} already exists", field),
                    )
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                AppError::detail("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::GateRejected(rejection) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(GateDetails::from(rejection)),
                    ..AppError::detail("STAGE_GATE_REJECTED", rejection.to_string())
                },
            ),
            AppError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                AppError::detail(
                    "STORAGE_ERROR",
                    format!("Document storage error: {}", msg),
                ),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                AppError::detail(
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                ),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                AppError::detail("INTERNAL_ERROR", msg.clone()),
            ),
        };

        // Gate rejections and validation failures are expected; only log them at warn
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!("Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Map a unique violation to `DuplicateEntry`, everything else to `DatabaseError`
pub fn map_unique_violation(err: sqlx::Error, field: &str) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
