//! Processing errors.

use keeper_api::{ApiError, SignerError};
use keeper_ledger::LedgerError;
use thiserror::Error;

/// Anything that can go wrong between winning a claim and recording an
/// outcome.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Signing error: {0}")]
    Signer(#[from] SignerError),
}

impl ProcessError {
    /// Retryable under the submission policy. Signing failures are always
    /// fatal for the opportunity: bad order fields do not improve on retry.
    #[must_use]
    pub fn is_retryable_submission(&self) -> bool {
        match self {
            Self::Api(e) => e.is_retryable_submission(),
            Self::Ledger(e) => e.is_retryable_submission(),
            Self::Signer(_) => false,
        }
    }
}

pub type ProcessResult<T> = Result<T, ProcessError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_conflicts_retry_from_either_layer() {
        assert!(ProcessError::Api(ApiError::SequenceConflict("raced".into()))
            .is_retryable_submission());
        assert!(
            ProcessError::Ledger(LedgerError::SequenceConflict("nonce used".into()))
                .is_retryable_submission()
        );
    }

    #[test]
    fn test_transient_api_failures_do_not_retry_submission() {
        // A transport failure after submit_bid may mean the bid landed;
        // retrying the whole submission could sign a second bid for the
        // same opportunity on a fresh nonce.
        assert!(
            !ProcessError::Api(ApiError::Transport("timed out".into())).is_retryable_submission()
        );
        assert!(
            !ProcessError::Api(ApiError::Server { status: 502 }).is_retryable_submission()
        );
        assert!(!ProcessError::Ledger(LedgerError::Transport("reset".into()))
            .is_retryable_submission());
    }

    #[test]
    fn test_signing_failures_never_retry() {
        let e = ProcessError::Signer(SignerError::InvalidFields("empty asset".into()));
        assert!(!e.is_retryable_submission());
    }
}
