//! Error handling for the AsthmaShield inference service
//!
//! Every failure leaves the service as `{"error": {"code", "message", "field"?}}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::ValidationError;
use thiserror::Error;

use crate::services::{ClassifierError, DataFetchError, PipelineError};

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    // Environmental provider errors
    #[error("Location not found: {0}")]
    LocationNotFound(String),

    #[error("Environmental data unavailable: {0}")]
    DataFetch(String),

    // Model errors
    #[error("Schema violation: {0}")]
    SchemaViolation(String),

    #[error("Model error: {0}")]
    Model(String),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Internal server error")]
    InternalError(#[from] anyhow::Error),
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
}

impl From<ValidationError> for AppError {
    fn from(err: ValidationError) -> Self {
        AppError::Validation {
            field: err.field().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<DataFetchError> for AppError {
    fn from(err: DataFetchError) -> Self {
        match err {
            DataFetchError::LocationNotFound(location) => AppError::LocationNotFound(location),
            other => AppError::DataFetch(other.to_string()),
        }
    }
}

impl From<ClassifierError> for AppError {
    fn from(err: ClassifierError) -> Self {
        match err {
            ClassifierError::SchemaViolation { .. } => AppError::SchemaViolation(err.to_string()),
            ClassifierError::InvalidOutput(_) => AppError::Model(err.to_string()),
        }
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::Validation(e) => e.into(),
            PipelineError::DataFetch(e) => e.into(),
            PipelineError::Classifier(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message: message.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::LocationNotFound(location) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "LOCATION_NOT_FOUND".to_string(),
                    message: format!("No environmental data for location {}", location),
                    field: Some("city".to_string()),
                },
            ),
            AppError::DataFetch(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail {
                    code: "DATA_FETCH_ERROR".to_string(),
                    message: format!("Environmental data is temporarily unavailable: {}", msg),
                    field: None,
                },
            ),
            AppError::SchemaViolation(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "SCHEMA_VIOLATION".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::Model(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "MODEL_ERROR".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: msg.clone(),
                    field: None,
                },
            ),
            AppError::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message: "An internal server error occurred".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::debug!("Rejected request: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
