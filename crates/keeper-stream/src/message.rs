//! Stream wire messages.
//!
//! Loosely-typed payloads at the stream boundary become a closed tagged
//! union here, decoded once at ingestion. Unrecognized tags and malformed
//! bodies never propagate deeper into the pipeline — they are dropped with a
//! debug log and the connection stays up.

use keeper_core::{Opportunity, OpportunityId, OpportunityKind};
use serde::Serialize;
use tracing::debug;

/// Uniform internal event produced by the stream, same shape regardless of
/// origin channel.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    /// An opportunity is actionable.
    Observed(Opportunity),
    /// An opportunity was settled or withdrawn by someone else.
    Resolved(OpportunityId),
}

/// Decoded inbound frame, including control traffic.
#[derive(Debug)]
pub(crate) enum Frame {
    Event(StreamEvent),
    /// Subscription ack, with whatever channels the server confirmed.
    SubscriptionAck(Vec<String>),
    Pong,
    /// Unknown tag or malformed body; dropped at the boundary.
    Ignored,
}

/// Outgoing subscription announcement.
#[derive(Debug, Serialize)]
pub(crate) struct SubscribeRequest<'a> {
    pub method: &'static str,
    pub channels: &'a [String],
}

impl<'a> SubscribeRequest<'a> {
    pub fn new(channels: &'a [String]) -> Self {
        Self {
            method: "subscribe",
            channels,
        }
    }
}

/// Outgoing application-level ping.
#[derive(Debug, Serialize)]
pub(crate) struct PingRequest {
    pub method: &'static str,
}

impl PingRequest {
    pub fn new() -> Self {
        Self { method: "ping" }
    }
}

/// Decode one text frame.
///
/// Total: every input maps to a `Frame`, with `Ignored` for anything outside
/// the closed set.
pub(crate) fn decode_frame(text: &str) -> Frame {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "Dropping unparseable stream frame");
            return Frame::Ignored;
        }
    };

    let tag = match value.get("type").and_then(|t| t.as_str()) {
        Some(t) => t,
        None => {
            debug!("Dropping stream frame without type tag");
            return Frame::Ignored;
        }
    };

    match tag {
        "opportunity-observed" => {
            let Some(body) = value.get("opportunity") else {
                debug!("Dropping observed frame without opportunity body");
                return Frame::Ignored;
            };
            match serde_json::from_value::<Opportunity>(body.clone()) {
                Ok(op) => {
                    if let Err(e) = op.validate() {
                        debug!(id = %op.id, error = %e, "Dropping invalid opportunity");
                        return Frame::Ignored;
                    }
                    Frame::Event(StreamEvent::Observed(op))
                }
                Err(e) => {
                    debug!(error = %e, "Dropping malformed opportunity body");
                    Frame::Ignored
                }
            }
        }
        "opportunity-resolved" => {
            let kind = value.get("kind").and_then(|k| k.as_str());
            let id = value.get("id").and_then(|i| i.as_str());
            match (kind, id) {
                (Some("rfq"), Some(id)) => {
                    Frame::Event(StreamEvent::Resolved(OpportunityId::rfq(id)))
                }
                (Some("liquidation"), Some(id)) => {
                    Frame::Event(StreamEvent::Resolved(OpportunityId::liquidation(id)))
                }
                _ => {
                    debug!("Dropping resolved frame with missing kind/id");
                    Frame::Ignored
                }
            }
        }
        "subscribed" => {
            let channels = value
                .get("channels")
                .and_then(|c| c.as_array())
                .map(|a| {
                    a.iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default();
            Frame::SubscriptionAck(channels)
        }
        "pong" => Frame::Pong,
        other => {
            debug!(tag = other, "Dropping unrecognized stream frame");
            Frame::Ignored
        }
    }
}

impl StreamEvent {
    /// Id of the opportunity this event concerns.
    #[must_use]
    pub fn opportunity_id(&self) -> OpportunityId {
        match self {
            Self::Observed(op) => op.opportunity_id(),
            Self::Resolved(id) => id.clone(),
        }
    }

    /// Kind of the opportunity this event concerns.
    #[must_use]
    pub fn kind(&self) -> OpportunityKind {
        match self {
            Self::Observed(op) => op.kind,
            Self::Resolved(id) => id.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_observed() {
        let text = r#"{
            "type": "opportunity-observed",
            "opportunity": {
                "id": "q-1",
                "chain": "testnet",
                "kind": "rfq",
                "payload": {"asset": "USDC", "size": "100", "side": "buy"}
            }
        }"#;

        match decode_frame(text) {
            Frame::Event(StreamEvent::Observed(op)) => {
                assert_eq!(op.opportunity_id(), OpportunityId::rfq("q-1"));
            }
            other => panic!("expected observed event, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_resolved() {
        let text = r#"{"type": "opportunity-resolved", "kind": "liquidation", "id": "p-4"}"#;
        match decode_frame(text) {
            Frame::Event(StreamEvent::Resolved(id)) => {
                assert_eq!(id, OpportunityId::liquidation("p-4"));
            }
            other => panic!("expected resolved event, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_tag_dropped() {
        assert!(matches!(
            decode_frame(r#"{"type": "fee-schedule-update", "bps": 3}"#),
            Frame::Ignored
        ));
    }

    #[test]
    fn test_malformed_body_dropped() {
        // Right tag, wrong body shape: dropped, not an error.
        let text = r#"{"type": "opportunity-observed", "opportunity": {"id": 42}}"#;
        assert!(matches!(decode_frame(text), Frame::Ignored));
    }

    #[test]
    fn test_non_json_dropped() {
        assert!(matches!(decode_frame("not json at all"), Frame::Ignored));
    }

    #[test]
    fn test_control_frames() {
        match decode_frame(r#"{"type": "subscribed", "channels": ["opportunities"]}"#) {
            Frame::SubscriptionAck(channels) => {
                assert_eq!(channels, vec!["opportunities".to_string()]);
            }
            other => panic!("expected subscription ack, got {other:?}"),
        }
        assert!(matches!(decode_frame(r#"{"type": "pong"}"#), Frame::Pong));
    }

    #[test]
    fn test_subscription_ack_without_channels() {
        // Some servers ack without echoing the channel list.
        match decode_frame(r#"{"type": "subscribed"}"#) {
            Frame::SubscriptionAck(channels) => assert!(channels.is_empty()),
            other => panic!("expected subscription ack, got {other:?}"),
        }
    }

    #[test]
    fn test_kind_mismatch_dropped() {
        // kind says liquidation but the payload is an RFQ body.
        let text = r#"{
            "type": "opportunity-observed",
            "opportunity": {
                "id": "q-1",
                "chain": "testnet",
                "kind": "liquidation",
                "payload": {"asset": "USDC", "size": "100", "side": "buy"}
            }
        }"#;
        assert!(matches!(decode_frame(text), Frame::Ignored));
    }
}
