//! Per-kind settlement strategies.
//!
//! The processor owns the at-most-once and sequencing machinery; strategies
//! own what differs between kinds: the extra eligibility gate, pricing, and
//! the shape of the signed submission.

use crate::error::{ProcessError, ProcessResult};
use crate::pricing::{liquidation_profit_estimate, rfq_quote};
use keeper_api::{
    LiquidationRequest, OrderFields, OrderSigner, SignedBid, SignerError, SubmissionClient,
};
use keeper_core::{Opportunity, OpportunityKind, QuoteSide, SkipReason};
use keeper_ledger::{LedgerRpc, TransactionIntent, TxHash};
use rust_decimal::Decimal;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Kind-specific behavior behind the shared processing pipeline.
pub trait KindStrategy: Send + Sync {
    fn kind(&self) -> OpportunityKind;

    /// Strategy-specific gate, run after the shared eligibility checks.
    fn check(&self, op: &Opportunity) -> Result<(), SkipReason>;

    /// Price, sign and submit one settlement using the allocated intent.
    ///
    /// Runs inside the sequencer's exclusive section. Returns a submission
    /// reference for the outcome record.
    fn submit<'a>(
        &'a self,
        op: &'a Opportunity,
        intent: TransactionIntent,
    ) -> BoxFuture<'a, ProcessResult<String>>;
}

fn wrong_payload(expected: OpportunityKind) -> ProcessError {
    ProcessError::Signer(SignerError::InvalidFields(format!(
        "payload does not match {expected} strategy"
    )))
}

/// Responds to price-quote requests with signed bids.
pub struct RfqStrategy {
    signer: Arc<dyn OrderSigner>,
    submission: Arc<SubmissionClient>,
    spread_bps: Decimal,
}

impl RfqStrategy {
    pub fn new(
        signer: Arc<dyn OrderSigner>,
        submission: Arc<SubmissionClient>,
        spread_bps: Decimal,
    ) -> Self {
        Self {
            signer,
            submission,
            spread_bps,
        }
    }
}

impl KindStrategy for RfqStrategy {
    fn kind(&self) -> OpportunityKind {
        OpportunityKind::Rfq
    }

    fn check(&self, op: &Opportunity) -> Result<(), SkipReason> {
        // Without a published reference price there is nothing to shade a
        // quote from.
        match op.payload.as_rfq() {
            Some(rfq) if rfq.reference_price.is_some() => Ok(()),
            _ => Err(SkipReason::NotProfitable),
        }
    }

    fn submit<'a>(
        &'a self,
        op: &'a Opportunity,
        intent: TransactionIntent,
    ) -> BoxFuture<'a, ProcessResult<String>> {
        Box::pin(async move {
            let rfq = op
                .payload
                .as_rfq()
                .ok_or_else(|| wrong_payload(OpportunityKind::Rfq))?;
            let reference = rfq.reference_price.ok_or_else(|| {
                ProcessError::Signer(SignerError::InvalidFields(
                    "rfq carries no reference price".to_string(),
                ))
            })?;

            let id = op.opportunity_id();
            let price = rfq_quote(reference, rfq.side, self.spread_bps);
            let side = match rfq.side {
                QuoteSide::Buy => "buy",
                QuoteSide::Sell => "sell",
            };

            let fields = OrderFields {
                opportunity_id: id.to_string(),
                asset: rfq.asset.clone(),
                side: side.to_string(),
                size: rfq.size.to_string(),
                price: price.to_string(),
                nonce: intent.nonce,
            };
            let signature = self.signer.sign(&fields)?;

            let bid = SignedBid {
                opportunity_id: id.to_string(),
                asset: rfq.asset.clone(),
                size: rfq.size,
                price,
                side: side.to_string(),
                nonce: intent.nonce,
                signer: self.signer.address().to_string(),
                signature,
                client_ref: Uuid::new_v4(),
            };

            let ack = self.submission.submit_bid(&bid).await?;
            let fin = self.submission.finalize(&id).await?;
            if fin.already_executed {
                info!(opportunity_id = %id, "Bid landed but settlement was already executed");
            }
            Ok(format!("bid {}", ack.bid_id))
        })
    }
}

/// Triggers liquidations of under-collateralized positions.
///
/// Unlike bids, a liquidation lands as a ledger transaction; the strategy
/// waits for its receipt before finalizing, still inside the sequencer's
/// exclusive section.
pub struct LiquidationStrategy {
    signer: Arc<dyn OrderSigner>,
    submission: Arc<SubmissionClient>,
    ledger: Arc<dyn LedgerRpc>,
    confirmation_timeout: Duration,
}

impl LiquidationStrategy {
    pub fn new(
        signer: Arc<dyn OrderSigner>,
        submission: Arc<SubmissionClient>,
        ledger: Arc<dyn LedgerRpc>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            signer,
            submission,
            ledger,
            confirmation_timeout,
        }
    }
}

impl KindStrategy for LiquidationStrategy {
    fn kind(&self) -> OpportunityKind {
        OpportunityKind::Liquidation
    }

    fn check(&self, op: &Opportunity) -> Result<(), SkipReason> {
        match op.payload.as_liquidation() {
            Some(position) if liquidation_profit_estimate(position) > Decimal::ZERO => Ok(()),
            _ => Err(SkipReason::NotProfitable),
        }
    }

    fn submit<'a>(
        &'a self,
        op: &'a Opportunity,
        intent: TransactionIntent,
    ) -> BoxFuture<'a, ProcessResult<String>> {
        Box::pin(async move {
            let position = op
                .payload
                .as_liquidation()
                .ok_or_else(|| wrong_payload(OpportunityKind::Liquidation))?;

            let id = op.opportunity_id();
            let fields = OrderFields {
                opportunity_id: id.to_string(),
                asset: position.debt_asset.clone(),
                side: "liquidate".to_string(),
                size: position.debt_value.to_string(),
                price: String::new(),
                nonce: intent.nonce,
            };
            let signature = self.signer.sign(&fields)?;

            let request = LiquidationRequest {
                opportunity_id: id.to_string(),
                account: position.account.clone(),
                debt_asset: position.debt_asset.clone(),
                nonce: intent.nonce,
                signer: self.signer.address().to_string(),
                signature,
                client_ref: Uuid::new_v4(),
            };

            let ack = self.submission.trigger_liquidation(&request).await?;

            let hash = TxHash(ack.tx_hash.clone());
            let receipt = self
                .ledger
                .wait_for_confirmation(&hash, self.confirmation_timeout)
                .await?;
            info!(opportunity_id = %id, block = receipt.block_height, "Liquidation confirmed");

            let fin = self.submission.finalize(&id).await?;
            if fin.already_executed {
                info!(opportunity_id = %id, "Liquidation raced; settlement already executed");
            }
            Ok(format!("tx {}", ack.tx_hash))
        })
    }
}
