//! API error types and retry classification.

use thiserror::Error;

/// Errors from the opportunity source and submission APIs.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection-level failure (DNS, refused, reset, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// HTTP 429.
    #[error("Rate limited by API")]
    RateLimited,

    /// HTTP 5xx.
    #[error("Server error: HTTP {status}")]
    Server { status: u16 },

    /// Non-retryable 4xx with whatever detail the body carried.
    #[error("Request rejected: HTTP {status}: {message}")]
    Client { status: u16, message: String },

    /// Submission raced another transaction from the same account.
    #[error("Sequence conflict: {0}")]
    SequenceConflict(String),

    /// Fee did not beat the pending transaction it would replace.
    #[error("Replacement underpriced: {0}")]
    ReplacementUnderpriced(String),

    /// The settlement was already executed by another party.
    #[error("Already finalized: {0}")]
    AlreadyFinalized(String),

    /// Response body did not match the expected shape.
    #[error("Failed to decode response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Errors worth retrying under the general API policy.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited | Self::Server { .. }
        )
    }

    /// Errors worth retrying under the submission policy: only a sequence
    /// conflict or an underpriced replacement, where a fresh nonce can
    /// succeed. Transient failures are not retried here; a timed-out
    /// request may have landed, and re-submitting would risk a duplicate
    /// settlement.
    #[must_use]
    pub fn is_retryable_submission(&self) -> bool {
        matches!(
            self,
            Self::SequenceConflict(_) | Self::ReplacementUnderpriced(_)
        )
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
