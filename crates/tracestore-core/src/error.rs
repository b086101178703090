use std::collections::BTreeSet;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Invalid store format: {0}")]
    InvalidFormat(String),

    #[error("Index {index} out of range for store with {len} traces")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Index must be a non-negative integer, got '{0}'")]
    TypeError(String),

    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("Schema violation for '{key}' (value '{value}'): {reason}")]
    SchemaViolation {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Unsupported readout: {0}")]
    UnsupportedReadout(String),

    #[error("Inconsistent origins for '{key}': {values:?}")]
    ConsistencyViolation {
        key: String,
        values: BTreeSet<String>,
    },

    #[error("Value can not be encoded as a plain literal: {0}")]
    EncodingViolation(String),

    #[error("Stale write rejected: {0}")]
    StaleWriteRejected(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn schema(key: &str, value: &str, reason: impl Into<String>) -> Self {
        StoreError::SchemaViolation {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}
