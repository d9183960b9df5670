//! Kind-independent eligibility gate.
//!
//! Applied after a claim is won and before any pricing or signing. A skip
//! here is a terminal outcome for the opportunity; the claim stands.

use chrono::{Duration, Utc};
use keeper_core::{ChainId, Opportunity, SkipReason};
use rust_decimal::Decimal;

/// Static gate configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct EligibilityConfig {
    /// Assets the agent is willing to settle in.
    pub allowed_assets: Vec<String>,
    /// Minimum economic size worth acting on.
    pub min_size: Decimal,
    /// Chains the agent can submit to.
    pub supported_chains: Vec<ChainId>,
    /// Opportunities expiring sooner than this are not worth the round trip.
    pub min_time_to_expiry: Duration,
}

impl EligibilityConfig {
    /// Check the shared gates in a fixed order: chain, asset, size, expiry.
    pub fn check(&self, op: &Opportunity) -> Result<(), SkipReason> {
        if !self.supported_chains.contains(&op.chain) {
            return Err(SkipReason::UnsupportedChain);
        }
        if !self.allowed_assets.iter().any(|a| a == op.asset()) {
            return Err(SkipReason::AssetNotAllowed);
        }
        if op.size() < self.min_size {
            return Err(SkipReason::BelowMinSize);
        }
        if let Some(remaining) = op.time_to_expiry(Utc::now()) {
            if remaining < self.min_time_to_expiry {
                return Err(SkipReason::ExpiringSoon);
            }
        }
        Ok(())
    }
}
