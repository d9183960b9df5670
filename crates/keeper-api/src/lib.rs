//! Opportunity source and settlement submission APIs.
//!
//! - [`SourceClient`]: polls the opportunity source for pending opportunities
//! - [`SubmissionClient`]: submits signed bids, liquidation triggers, and
//!   finalize calls
//! - [`OrderSigner`]: signs the canonical order digest
//! - [`OutcomeRecorder`]: best-effort audit sink for terminal outcomes

pub mod client;
pub mod error;
pub mod recorder;
pub mod signer;

pub use client::{
    BidAck, FinalizeAck, LiquidationAck, LiquidationRequest, SignedBid, SourceClient,
    SubmissionClient,
};
pub use error::{ApiError, ApiResult};
pub use recorder::{HttpRecorder, NoopRecorder, OutcomeRecorder, TracingRecorder};
pub use signer::{LocalOrderSigner, OrderFields, OrderSigner, Signature, SignerError};
