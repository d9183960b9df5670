//! Backoff policies and retry execution for keeper.
//!
//! Two independent policy instances are used in practice:
//! - the API policy, for fetching opportunities and posting settlement calls;
//! - the submission policy, for the narrow class of sequence-number failures.
//!
//! The executor is classification-driven: the caller supplies a predicate
//! deciding whether a given error is worth another attempt.

pub mod backoff;
pub mod executor;

pub use backoff::BackoffPolicy;
pub use executor::run_with_retry;
