pub mod analysis;
pub mod augment;
pub mod risk;

use axum::http::StatusCode;
use bizintel_core::{CompletionError, EncodingError, FieldIssue, SchemaMismatch, ValidationError};
use thiserror::Error;

/// Every way a single pipeline run can fail.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Invalid JSON in request body: {0}")]
    InvalidJson(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("Completion service failed: {0}")]
    Upstream(#[from] CompletionError),

    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatch),

    #[error("Request timed out after {0}s")]
    Timeout(u64),
}

impl ServiceError {
    /// Stable machine-readable error kind for the JSON envelope.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::InvalidJson(_) | ServiceError::Validation(_) => "validation_error",
            ServiceError::Encoding(_) => "encoding_error",
            ServiceError::Upstream(_) => "upstream_error",
            ServiceError::SchemaMismatch(_) => "schema_mismatch",
            ServiceError::Timeout(_) => "timeout",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidJson(_) | ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::Encoding(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Upstream(_) | ServiceError::SchemaMismatch(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Timeout(_) => StatusCode::REQUEST_TIMEOUT,
        }
    }

    pub fn details(&self) -> Vec<FieldIssue> {
        match self {
            ServiceError::Validation(e) => e.issues.clone(),
            ServiceError::SchemaMismatch(e) => e.issues.clone(),
            ServiceError::Encoding(e) => vec![FieldIssue::new(
                e.field,
                format!("at most {} characters", e.limit),
            )],
            _ => Vec::new(),
        }
    }
}

/// Parse a raw request body as JSON. An empty body is an empty object so the
/// schema validator can name the missing fields.
pub fn parse_body(body: &[u8]) -> Result<serde_json::Value, ServiceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::json!({}));
    }
    serde_json::from_slice(body).map_err(|e| ServiceError::InvalidJson(e.to_string()))
}
