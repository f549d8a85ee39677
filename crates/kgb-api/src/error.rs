//! API error handling
//!
//! Author: hephaex@gmail.com

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use kgb_core::KgbError;
use kgb_parser::ParserError;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// API error response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Error code
    pub code: String,
    /// Human-readable message
    pub message: String,
    /// Additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn upstream_error() -> Self {
        Self::new("UPSTREAM_ERROR", "Model service request failed")
    }

    pub fn internal_error() -> Self {
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Upstream(String),
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ApiError::bad_request(msg)),
            AppError::Upstream(msg) => {
                tracing::warn!(error = %msg, "Upstream model failure");
                (
                    StatusCode::BAD_GATEWAY,
                    ApiError::upstream_error().with_details(msg),
                )
            }
            AppError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiError::internal_error().with_details(msg),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<KgbError> for AppError {
    fn from(err: KgbError) -> Self {
        match err {
            KgbError::Validation(msg) => AppError::BadRequest(msg),
            KgbError::Inference(msg) => AppError::Upstream(msg),
            KgbError::Parse(msg) => AppError::Internal(format!("Parse error: {msg}")),
            KgbError::Extraction(msg) => AppError::Internal(format!("Extraction error: {msg}")),
            KgbError::Graph(msg) => AppError::Internal(format!("Graph error: {msg}")),
            KgbError::Config(msg) => AppError::Internal(format!("Configuration error: {msg}")),
            KgbError::Other(err) => AppError::Internal(err.to_string()),
        }
    }
}

impl From<ParserError> for AppError {
    fn from(err: ParserError) -> Self {
        match err {
            ParserError::IoError { .. } => AppError::Internal(err.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}
