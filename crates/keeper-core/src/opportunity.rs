//! Opportunity types.
//!
//! An opportunity is an externally discovered actionable event: a price-quote
//! request (RFQ) or an under-collateralized position (liquidation). Identity
//! is the raw source id *within its kind's namespace* — RFQ and liquidation
//! ids are allowed to collide at the source, so every internal lookup goes
//! through [`OpportunityId`], which carries the kind.

use crate::error::{CoreError, Result};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two opportunity kinds the agent acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpportunityKind {
    /// Price-quote request: respond with a signed bid.
    Rfq,
    /// Under-collateralized position: trigger a liquidation.
    Liquidation,
}

impl OpportunityKind {
    /// Stable lowercase name, used in ids, logs and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rfq => "rfq",
            Self::Liquidation => "liquidation",
        }
    }
}

impl fmt::Display for OpportunityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind-namespaced opportunity identity.
///
/// This is the key type for the dedup cache: two opportunities are the same
/// iff kind and raw id both match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpportunityId {
    pub kind: OpportunityKind,
    pub raw: String,
}

impl OpportunityId {
    pub fn new(kind: OpportunityKind, raw: impl Into<String>) -> Self {
        Self {
            kind,
            raw: raw.into(),
        }
    }

    pub fn rfq(raw: impl Into<String>) -> Self {
        Self::new(OpportunityKind::Rfq, raw)
    }

    pub fn liquidation(raw: impl Into<String>) -> Self {
        Self::new(OpportunityKind::Liquidation, raw)
    }
}

impl fmt::Display for OpportunityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.raw)
    }
}

/// Chain identifier (e.g., "testnet", "mainnet").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChainId(String);

impl ChainId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ChainId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which side of the asset the requester wants quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSide {
    Buy,
    Sell,
}

/// RFQ payload: the quote request as published by the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RfqRequest {
    /// Asset symbol being quoted.
    pub asset: String,
    /// Requested size in asset units.
    pub size: Decimal,
    /// Side the requester is taking.
    pub side: QuoteSide,
    /// Reference price published alongside the request, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_price: Option<Decimal>,
}

/// Liquidation payload: the under-collateralized position.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationPosition {
    /// Borrower account being liquidated.
    pub account: String,
    /// Asset the liquidator repays.
    pub debt_asset: String,
    /// Asset the liquidator seizes.
    pub collateral_asset: String,
    /// Value of the repayable debt, in the debt asset's own units.
    pub debt_value: Decimal,
    /// Value of the seizable collateral, in the collateral asset's own units.
    pub collateral_value: Decimal,
}

/// Per-kind payload body.
///
/// Untagged: the field sets of the two variants are disjoint, and sources
/// publish the payload without a discriminator (the discriminator lives in
/// the enclosing opportunity's `kind`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OpportunityPayload {
    Rfq(RfqRequest),
    Liquidation(LiquidationPosition),
}

impl OpportunityPayload {
    /// Kind implied by the payload variant.
    #[must_use]
    pub fn kind(&self) -> OpportunityKind {
        match self {
            Self::Rfq(_) => OpportunityKind::Rfq,
            Self::Liquidation(_) => OpportunityKind::Liquidation,
        }
    }

    #[must_use]
    pub fn as_rfq(&self) -> Option<&RfqRequest> {
        match self {
            Self::Rfq(r) => Some(r),
            Self::Liquidation(_) => None,
        }
    }

    #[must_use]
    pub fn as_liquidation(&self) -> Option<&LiquidationPosition> {
        match self {
            Self::Liquidation(l) => Some(l),
            Self::Rfq(_) => None,
        }
    }
}

/// An externally discovered actionable event, immutable once observed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Opportunity {
    /// Raw source id. Namespaced by `kind`; see [`Opportunity::opportunity_id`].
    pub id: String,
    /// Chain the settlement must land on.
    pub chain: ChainId,
    pub kind: OpportunityKind,
    /// When the opportunity stops being actionable, if the source publishes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<Utc>>,
    pub payload: OpportunityPayload,
}

impl Opportunity {
    /// Kind-namespaced identity for dedup and reporting.
    #[must_use]
    pub fn opportunity_id(&self) -> OpportunityId {
        OpportunityId::new(self.kind, self.id.clone())
    }

    /// Check that the payload variant matches the declared kind.
    ///
    /// Sources are loosely typed; a mismatch means the record is malformed
    /// and must be dropped at the boundary.
    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() {
            return Err(CoreError::InvalidId("empty id".to_string()));
        }
        let payload_kind = self.payload.kind();
        if payload_kind != self.kind {
            return Err(CoreError::KindMismatch {
                id_kind: self.kind.as_str(),
                payload_kind: payload_kind.as_str(),
            });
        }
        Ok(())
    }

    /// Asset this opportunity settles in (quoted asset or repaid debt asset).
    #[must_use]
    pub fn asset(&self) -> &str {
        match &self.payload {
            OpportunityPayload::Rfq(r) => &r.asset,
            OpportunityPayload::Liquidation(l) => &l.debt_asset,
        }
    }

    /// Economic size used for the minimum-size eligibility check.
    #[must_use]
    pub fn size(&self) -> Decimal {
        match &self.payload {
            OpportunityPayload::Rfq(r) => r.size,
            OpportunityPayload::Liquidation(l) => l.debt_value,
        }
    }

    /// Time remaining until expiry, or `None` when the source set no expiry.
    ///
    /// Negative when already expired.
    #[must_use]
    pub fn time_to_expiry(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.expiry.map(|e| e - now)
    }
}

/// Filter for listing pending opportunities from the source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpportunityFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<OpportunityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<ChainId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rfq_opportunity(raw_id: &str) -> Opportunity {
        Opportunity {
            id: raw_id.to_string(),
            chain: ChainId::new("testnet"),
            kind: OpportunityKind::Rfq,
            expiry: None,
            payload: OpportunityPayload::Rfq(RfqRequest {
                asset: "USDC".to_string(),
                size: dec!(1000),
                side: QuoteSide::Buy,
                reference_price: Some(dec!(1.0002)),
            }),
        }
    }

    #[test]
    fn test_ids_namespaced_by_kind() {
        let a = OpportunityId::rfq("42");
        let b = OpportunityId::liquidation("42");
        assert_ne!(a, b, "same raw id in different kinds must not collide");
        assert_eq!(a.to_string(), "rfq/42");
        assert_eq!(b.to_string(), "liquidation/42");
    }

    #[test]
    fn test_validate_accepts_matching_payload() {
        assert!(rfq_opportunity("q-1").validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_kind_mismatch() {
        let mut op = rfq_opportunity("q-1");
        op.kind = OpportunityKind::Liquidation;
        assert!(matches!(
            op.validate(),
            Err(CoreError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_id() {
        let op = rfq_opportunity("");
        assert!(matches!(op.validate(), Err(CoreError::InvalidId(_))));
    }

    #[test]
    fn test_wire_decode() {
        let json = r#"{
            "id": "rfq-778",
            "chain": "testnet",
            "kind": "rfq",
            "expiry": "2026-08-25T12:00:00Z",
            "payload": {
                "asset": "XLM",
                "size": "2500",
                "side": "sell",
                "referencePrice": "0.41"
            }
        }"#;

        let op: Opportunity = serde_json::from_str(json).unwrap();
        assert_eq!(op.kind, OpportunityKind::Rfq);
        assert_eq!(op.asset(), "XLM");
        assert_eq!(op.size(), dec!(2500));
        assert!(op.expiry.is_some());
        op.validate().unwrap();
    }

    #[test]
    fn test_liquidation_payload_decode() {
        let json = r#"{
            "id": "pos-9",
            "chain": "mainnet",
            "kind": "liquidation",
            "payload": {
                "account": "GABC",
                "debtAsset": "USDC",
                "collateralAsset": "XLM",
                "debtValue": "1200.50",
                "collateralValue": "1500"
            }
        }"#;

        let op: Opportunity = serde_json::from_str(json).unwrap();
        op.validate().unwrap();
        let pos = op.payload.as_liquidation().unwrap();
        assert_eq!(pos.account, "GABC");
        assert_eq!(op.size(), dec!(1200.50));
    }

    #[test]
    fn test_time_to_expiry_sign() {
        let now = Utc::now();
        let mut op = rfq_opportunity("q-2");
        op.expiry = Some(now + Duration::seconds(30));
        assert!(op.time_to_expiry(now).unwrap() > Duration::zero());

        op.expiry = Some(now - Duration::seconds(30));
        assert!(op.time_to_expiry(now).unwrap() < Duration::zero());
    }
}
