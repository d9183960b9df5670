//! Settlement pipeline for one observed opportunity.
//!
//! Both observation channels feed [`OpportunityProcessor::on_observed`]. The
//! claim is taken before any other work, so of N redundant observations
//! exactly one proceeds to eligibility, pricing, signing and submission, and
//! every claimed opportunity ends in exactly one recorded outcome.

use crate::dedup::DedupCache;
use crate::eligibility::EligibilityConfig;
use crate::error::ProcessError;
use crate::metrics;
use crate::strategy::KindStrategy;
use chrono::Utc;
use keeper_api::OutcomeRecorder;
use keeper_core::{Opportunity, OpportunityId, OpportunityKind, ProcessingOutcome};
use keeper_ledger::NonceSequencer;
use keeper_retry::{run_with_retry, BackoffPolicy};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct OpportunityProcessor {
    dedup: Arc<DedupCache>,
    eligibility: EligibilityConfig,
    sequencer: Arc<NonceSequencer>,
    rfq: Arc<dyn KindStrategy>,
    liquidation: Arc<dyn KindStrategy>,
    recorder: Arc<dyn OutcomeRecorder>,
    submission_policy: BackoffPolicy,
}

impl OpportunityProcessor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dedup: Arc<DedupCache>,
        eligibility: EligibilityConfig,
        sequencer: Arc<NonceSequencer>,
        rfq: Arc<dyn KindStrategy>,
        liquidation: Arc<dyn KindStrategy>,
        recorder: Arc<dyn OutcomeRecorder>,
        submission_policy: BackoffPolicy,
    ) -> Self {
        Self {
            dedup,
            eligibility,
            sequencer,
            rfq,
            liquidation,
            recorder,
            submission_policy,
        }
    }

    fn strategy_for(&self, kind: OpportunityKind) -> &Arc<dyn KindStrategy> {
        match kind {
            OpportunityKind::Rfq => &self.rfq,
            OpportunityKind::Liquidation => &self.liquidation,
        }
    }

    /// Process one observation from either channel.
    ///
    /// The claim is taken before eligibility, pricing or submission, and it
    /// is terminal: a skipped or failed opportunity is not reprocessed when
    /// the other channel re-observes it inside the TTL window.
    pub async fn on_observed(&self, op: &Opportunity, channel: &'static str) {
        let kind = op.kind.as_str();
        let id = op.opportunity_id();
        metrics::OPPORTUNITIES_OBSERVED
            .with_label_values(&[kind, channel])
            .inc();

        if !self.dedup.claim(&id, Utc::now()) {
            metrics::DUPLICATES_DROPPED.with_label_values(&[kind]).inc();
            debug!(opportunity_id = %id, channel, "Duplicate observation dropped");
            return;
        }
        metrics::CLAIMS_WON.with_label_values(&[kind]).inc();
        metrics::DEDUP_SIZE.set(self.dedup.len() as i64);
        info!(opportunity_id = %id, channel, "Claimed opportunity");

        let strategy = self.strategy_for(op.kind);
        let gate = self
            .eligibility
            .check(op)
            .and_then(|()| strategy.check(op));
        if let Err(reason) = gate {
            metrics::SKIPS_TOTAL
                .with_label_values(&[kind, reason.as_str()])
                .inc();
            info!(opportunity_id = %id, reason = %reason, "Skipped opportunity");
            self.recorder
                .record(&ProcessingOutcome::skipped(id, reason))
                .await;
            return;
        }

        let result = run_with_retry(
            &self.submission_policy,
            |e: &ProcessError| e.is_retryable_submission(),
            |attempt| {
                let sequencer = Arc::clone(&self.sequencer);
                let strategy = Arc::clone(strategy);
                async move {
                    if attempt > 1 {
                        // A conflicting attempt must not reuse the cached
                        // nonce; force the next allocation to re-query.
                        sequencer.invalidate().await;
                    }
                    sequencer
                        .execute_transaction(|intent| strategy.submit(op, intent))
                        .await
                }
            },
        )
        .await;

        match result {
            Ok(reference) => {
                metrics::SUBMISSIONS_TOTAL.with_label_values(&[kind]).inc();
                info!(opportunity_id = %id, reference = %reference, "Settlement submitted");
                self.recorder
                    .record(&ProcessingOutcome::submitted(id, reference))
                    .await;
            }
            Err(e) => {
                metrics::FAILURES_TOTAL.with_label_values(&[kind]).inc();
                warn!(opportunity_id = %id, error = %e, "Settlement failed; claim stands");
                self.recorder
                    .record(&ProcessingOutcome::failed(id, e.to_string()))
                    .await;
            }
        }
    }

    /// Handle an external resolution: the opportunity is gone, so claim it
    /// to stop a stale poll result from acting on it later.
    pub fn on_resolved(&self, id: &OpportunityId) {
        if self.dedup.claim(id, Utc::now()) {
            debug!(opportunity_id = %id, "Resolved externally before we acted");
        }
    }
}
