//! Error handling for the nursery IPM server
//!
//! Every error is rendered as the uniform action envelope
//! `{ "success": false, "error": "..." }` with a matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use shared::ledger::LedgerError;
use shared::planning::PlanError;
use shared::{ActionResponse, TaskIdError, UnknownVariant};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    // Validation errors
    #[error("{message}")]
    Validation { field: String, message: String },

    #[error("{0} not found")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidStateTransition(_) | AppError::InsufficientStock(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::DatabaseError(_) | AppError::Internal(_) | AppError::InternalError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("Record".to_string()),
            other => AppError::DatabaseError(other),
        }
    }
}

impl From<TaskIdError> for AppError {
    fn from(err: TaskIdError) -> Self {
        AppError::validation("task_ids", err.to_string())
    }
}

impl From<PlanError> for AppError {
    fn from(err: PlanError) -> Self {
        AppError::validation("spot_treatment", err.to_string())
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NonPositiveQuantity => AppError::validation("quantity_ml", err.to_string()),
            LedgerError::LevelOutOfRange { .. } => {
                AppError::validation("new_remaining_ml", err.to_string())
            }
            LedgerError::Insufficient { .. } => AppError::InsufficientStock(err.to_string()),
            LedgerError::NotUsable { .. } | LedgerError::NotSealed { .. } => {
                AppError::InvalidStateTransition(err.to_string())
            }
        }
    }
}

impl From<UnknownVariant> for AppError {
    fn from(err: UnknownVariant) -> Self {
        AppError::Internal(format!("Unreadable row: {}", err))
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .next()
            .map(|k| k.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        (status, Json(ActionResponse::<()>::failure(self.to_string()))).into_response()
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;
