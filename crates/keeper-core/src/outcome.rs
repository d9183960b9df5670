//! Processing outcomes.
//!
//! Every claimed opportunity ends in exactly one outcome, reported to the
//! external recorder. The claim itself is terminal with respect to
//! reprocessing: a `failed` outcome is surfaced for operator investigation,
//! never auto-retried on a later re-observation.

use crate::opportunity::OpportunityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Final disposition of a claimed opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeResult {
    Submitted,
    Skipped,
    Failed,
}

impl fmt::Display for OutcomeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Submitted => "submitted",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Why an opportunity was skipped by the eligibility gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    AssetNotAllowed,
    BelowMinSize,
    UnsupportedChain,
    ExpiringSoon,
    NotProfitable,
}

impl SkipReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssetNotAllowed => "asset-not-allowed",
            Self::BelowMinSize => "below-min-size",
            Self::UnsupportedChain => "unsupported-chain",
            Self::ExpiringSoon => "expiring-soon",
            Self::NotProfitable => "not-profitable",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Uniform outcome record handed to the recorder, one per claimed opportunity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingOutcome {
    pub opportunity_id: OpportunityId,
    pub result: OutcomeResult,
    /// Submission reference, skip reason, or failure detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ProcessingOutcome {
    pub fn submitted(id: OpportunityId, reference: impl Into<String>) -> Self {
        Self {
            opportunity_id: id,
            result: OutcomeResult::Submitted,
            detail: Some(reference.into()),
            recorded_at: Utc::now(),
        }
    }

    pub fn skipped(id: OpportunityId, reason: SkipReason) -> Self {
        Self {
            opportunity_id: id,
            result: OutcomeResult::Skipped,
            detail: Some(reason.as_str().to_string()),
            recorded_at: Utc::now(),
        }
    }

    pub fn failed(id: OpportunityId, detail: impl Into<String>) -> Self {
        Self {
            opportunity_id: id,
            result: OutcomeResult::Failed,
            detail: Some(detail.into()),
            recorded_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serializes_lowercase_result() {
        let outcome = ProcessingOutcome::submitted(OpportunityId::rfq("q-1"), "bid-7");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["result"], "submitted");
        assert_eq!(json["detail"], "bid-7");
    }

    #[test]
    fn test_skip_reason_detail() {
        let outcome =
            ProcessingOutcome::skipped(OpportunityId::liquidation("p-3"), SkipReason::BelowMinSize);
        assert_eq!(outcome.result, OutcomeResult::Skipped);
        assert_eq!(outcome.detail.as_deref(), Some("below-min-size"));
    }
}
