//! Settlement engine: at-most-once claim cache, eligibility and pricing
//! gates, per-kind strategies, and the processing pipeline that ties the
//! observation channels to signed submissions.

pub mod dedup;
pub mod eligibility;
pub mod error;
pub mod metrics;
pub mod pricing;
pub mod processor;
pub mod runtime;
pub mod strategy;

pub use dedup::{DedupCache, DedupConfig};
pub use eligibility::EligibilityConfig;
pub use error::{ProcessError, ProcessResult};
pub use processor::OpportunityProcessor;
pub use runtime::{EngineRuntime, RuntimeConfig};
pub use strategy::{KindStrategy, LiquidationStrategy, RfqStrategy};
