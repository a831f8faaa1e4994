//! Response types for the Incentive Engine API.
//!
//! This module defines the error response structures and the mapping from
//! [`EngineError`] to HTTP status codes.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, ErrorKind};
use crate::service::BatchOutcome;

/// API error response structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Optional details about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// Creates a new API error with details.
    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: Some(details.into()),
        }
    }

    /// Creates a malformed JSON error response.
    pub fn malformed_json(message: impl Into<String>) -> Self {
        Self::new("MALFORMED_JSON", message)
    }
}

/// The stable code reported for an engine error.
fn error_code(error: &EngineError) -> &'static str {
    match error {
        EngineError::ConfigNotFound { .. } | EngineError::ConfigParseError { .. } => "CONFIG_ERROR",
        EngineError::Validation { .. } => "VALIDATION_ERROR",
        EngineError::CurrencyMismatch { .. } => "CURRENCY_MISMATCH",
        EngineError::SelfDelegation { .. } => "SELF_DELEGATION",
        EngineError::InvalidTransition { .. } => "INVALID_TRANSITION",
        EngineError::ApproverMismatch { .. } => "APPROVER_MISMATCH",
        EngineError::PendingApprovalExists { .. } => "PENDING_APPROVAL_EXISTS",
        EngineError::DuplicateCalculation { .. } => "DUPLICATE_CALCULATION",
        EngineError::ConcurrencyConflict { .. } => "CONCURRENCY_CONFLICT",
        EngineError::NotFound { .. } => "NOT_FOUND",
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Precondition | ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<&EngineError> for ApiError {
    fn from(error: &EngineError) -> Self {
        match error {
            EngineError::Validation { field, .. } => ApiError::with_details(
                error_code(error),
                error.to_string(),
                format!("The value of '{}' was rejected", field),
            ),
            _ => ApiError::new(error_code(error), error.to_string()),
        }
    }
}

/// API error with HTTP status code.
pub struct ApiErrorResponse {
    /// The HTTP status code.
    pub status: StatusCode,
    /// The error body.
    pub error: ApiError,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.error)).into_response()
    }
}

impl From<EngineError> for ApiErrorResponse {
    fn from(error: EngineError) -> Self {
        ApiErrorResponse {
            status: status_for(error.kind()),
            error: ApiError::from(&error),
        }
    }
}

/// One item of a batch response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItemResponse<T> {
    /// Identifies the item.
    pub item: String,
    /// The result of a successful item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// The error of a failed item.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> From<BatchOutcome<T>> for BatchItemResponse<T> {
    fn from(outcome: BatchOutcome<T>) -> Self {
        match outcome.result {
            Ok(value) => BatchItemResponse {
                item: outcome.item,
                result: Some(value),
                error: None,
            },
            Err(e) => BatchItemResponse {
                item: outcome.item,
                result: None,
                error: Some(ApiError::from(&e)),
            },
        }
    }
}
