//! Error types for keeper-core.

use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid opportunity id: {0}")]
    InvalidId(String),

    #[error("Payload kind mismatch: id says {id_kind}, payload is {payload_kind}")]
    KindMismatch {
        id_kind: &'static str,
        payload_kind: &'static str,
    },

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
