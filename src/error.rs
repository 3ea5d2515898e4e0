//! Error types for retention-flux

use thiserror::Error;

use crate::schema::{EntityId, ValidationError};

/// Errors that can occur while building retention datasets
#[derive(Debug, Error)]
pub enum RetentionError {
    #[error("Invalid event: {0}")]
    Validation(#[from] ValidationError),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Event belongs to entity {actual}, builder owns {expected}")]
    EntityMismatch { expected: EntityId, actual: EntityId },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl RetentionError {
    /// Whether this error only means "not enough events to emit a row"
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, RetentionError::InsufficientData(_))
    }
}
