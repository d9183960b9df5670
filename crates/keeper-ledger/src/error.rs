//! Ledger error taxonomy.
//!
//! Classification drives the retry policies: transient transport failures
//! are retried by the API policy, sequence conflicts and underpriced
//! replacements by the submission policy (with forced nonce resync), and
//! everything else is fatal for the attempt.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    /// Connection reset, timeout, DNS failure.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Rate limited by ledger RPC")]
    RateLimited,

    #[error("Ledger RPC server error: HTTP {status}")]
    Server { status: u16 },

    /// The nonce was already consumed by a competing submission.
    #[error("Sequence conflict: {0}")]
    SequenceConflict(String),

    /// A pending transaction with the same nonce outbids this one.
    #[error("Replacement underpriced: {0}")]
    ReplacementUnderpriced(String),

    /// Confirmation wait exceeded its ceiling. The underlying transaction may
    /// still land; the sequencer must resync before the next allocation.
    #[error("Confirmation timeout for {hash} after {waited_ms}ms")]
    ConfirmationTimeout { hash: String, waited_ms: u64 },

    /// Malformed or rejected transaction content.
    #[error("Validation failure: {0}")]
    Validation(String),

    /// Unclassified RPC-level error.
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LedgerError {
    /// Retryable under the API policy (transient network and server trouble).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::RateLimited | Self::Server { .. }
        )
    }

    /// Retryable under the submission policy. A conflict proves a competing
    /// allocation used the slot, so the retry must follow a nonce resync —
    /// which the sequencer already forces by invalidating on any failure.
    #[must_use]
    pub fn is_retryable_submission(&self) -> bool {
        matches!(
            self,
            Self::SequenceConflict(_) | Self::ReplacementUnderpriced(_)
        )
    }
}

impl From<reqwest::Error> for LedgerError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            if status.as_u16() == 429 {
                return Self::RateLimited;
            }
            if status.is_server_error() {
                return Self::Server {
                    status: status.as_u16(),
                };
            }
        }
        Self::Transport(e.to_string())
    }
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_retryable_classification() {
        assert!(LedgerError::SequenceConflict("nonce too low".into()).is_retryable_submission());
        assert!(LedgerError::ReplacementUnderpriced("outbid".into()).is_retryable_submission());
        assert!(!LedgerError::Transport("reset".into()).is_retryable_submission());
        assert!(!LedgerError::ConfirmationTimeout {
            hash: "0xabc".into(),
            waited_ms: 60_000
        }
        .is_retryable_submission());
    }

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::Transport("dns".into()).is_transient());
        assert!(LedgerError::RateLimited.is_transient());
        assert!(LedgerError::Server { status: 503 }.is_transient());
        assert!(!LedgerError::Validation("bad sig".into()).is_transient());
    }
}
