//! Core domain types for the keeper settlement agent.
//!
//! This crate provides the fundamental types shared by every layer:
//! - `Opportunity`: an externally discovered actionable event (RFQ or liquidation)
//! - `OpportunityId`: kind-namespaced identity used for deduplication
//! - `ProcessingOutcome`: the uniform result reported per opportunity

pub mod error;
pub mod opportunity;
pub mod outcome;

pub use error::{CoreError, Result};
pub use opportunity::{
    ChainId, LiquidationPosition, Opportunity, OpportunityFilter, OpportunityId, OpportunityKind,
    OpportunityPayload, QuoteSide, RfqRequest,
};
pub use outcome::{OutcomeResult, ProcessingOutcome, SkipReason};
