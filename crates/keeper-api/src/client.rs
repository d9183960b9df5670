//! HTTP clients for the opportunity source and settlement submission APIs.

use crate::error::{ApiError, ApiResult};
use crate::signer::Signature;
use keeper_core::{Opportunity, OpportunityFilter, OpportunityId};
use reqwest::{Client, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Error body shape shared by both APIs.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Map a non-success response to an `ApiError`.
///
/// 409 responses are disambiguated by the `code` field: a settlement lost to
/// another submitter, a nonce race, or an underpriced replacement all arrive
/// as conflicts but call for different handling.
async fn classify_error(response: Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or(ErrorBody {
        code: String::new(),
        message: body.clone(),
    });

    if status == StatusCode::TOO_MANY_REQUESTS {
        return ApiError::RateLimited;
    }
    if status.is_server_error() {
        return ApiError::Server {
            status: status.as_u16(),
        };
    }
    if status == StatusCode::CONFLICT {
        return match parsed.code.as_str() {
            "sequence-conflict" => ApiError::SequenceConflict(parsed.message),
            "replacement-underpriced" => ApiError::ReplacementUnderpriced(parsed.message),
            "already-finalized" | "already-executed" => ApiError::AlreadyFinalized(parsed.message),
            _ => ApiError::Client {
                status: status.as_u16(),
                message: parsed.message,
            },
        };
    }
    ApiError::Client {
        status: status.as_u16(),
        message: parsed.message,
    }
}

fn build_http_client() -> ApiResult<Client> {
    Client::builder()
        .timeout(DEFAULT_TIMEOUT)
        .build()
        .map_err(|e| ApiError::Transport(format!("Failed to create HTTP client: {e}")))
}

// =============================================================================
// Source API
// =============================================================================

#[derive(Debug, Deserialize)]
struct PendingResponse {
    opportunities: Vec<Opportunity>,
}

/// Client for the opportunity source API.
pub struct SourceClient {
    client: Client,
    base_url: String,
}

impl SourceClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into(),
        })
    }

    /// Fetch opportunities that are currently open, optionally filtered by
    /// kind and chain. Malformed entries are dropped, not fatal.
    pub async fn list_pending(&self, filter: &OpportunityFilter) -> ApiResult<Vec<Opportunity>> {
        let url = format!("{}/v1/opportunities/pending", self.base_url);
        debug!(url = %url, "Fetching pending opportunities");

        let mut request = self.client.get(&url);
        if let Some(kind) = filter.kind {
            request = request.query(&[("kind", kind.as_str())]);
        }
        if let Some(chain) = &filter.chain {
            request = request.query(&[("chain", chain.as_str())]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }

        let body: PendingResponse = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;

        let mut valid = Vec::with_capacity(body.opportunities.len());
        for op in body.opportunities {
            match op.validate() {
                Ok(()) => valid.push(op),
                Err(e) => warn!(id = %op.id, error = %e, "Dropping malformed opportunity"),
            }
        }
        debug!(count = valid.len(), "Fetched pending opportunities");
        Ok(valid)
    }

    /// Reachability probe for startup preflight.
    pub async fn probe(&self) -> ApiResult<()> {
        self.list_pending(&OpportunityFilter::default()).await?;
        Ok(())
    }
}

// =============================================================================
// Submission API
// =============================================================================

/// A signed quote for an RFQ opportunity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedBid {
    pub opportunity_id: String,
    pub asset: String,
    pub size: Decimal,
    pub price: Decimal,
    pub side: String,
    pub nonce: u64,
    pub signer: String,
    pub signature: Signature,
    /// Client-generated correlation id, unique per submission attempt.
    pub client_ref: Uuid,
}

/// A signed liquidation trigger.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationRequest {
    pub opportunity_id: String,
    pub account: String,
    pub debt_asset: String,
    pub nonce: u64,
    pub signer: String,
    pub signature: Signature,
    pub client_ref: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidAck {
    pub bid_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationAck {
    pub tx_hash: String,
}

/// Outcome of a finalize call.
///
/// `already_executed` is true when another party finalized first; the
/// settlement is complete either way.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeAck {
    #[serde(default)]
    pub tx_hash: Option<String>,
    #[serde(default)]
    pub already_executed: bool,
}

/// Client for the settlement submission API.
pub struct SubmissionClient {
    client: Client,
    base_url: String,
}

impl SubmissionClient {
    pub fn new(base_url: impl Into<String>) -> ApiResult<Self> {
        Ok(Self {
            client: build_http_client()?,
            base_url: base_url.into(),
        })
    }

    /// Submit a signed bid for an RFQ opportunity.
    pub async fn submit_bid(&self, bid: &SignedBid) -> ApiResult<BidAck> {
        let url = format!("{}/v1/bids", self.base_url);
        info!(
            opportunity_id = %bid.opportunity_id,
            nonce = bid.nonce,
            client_ref = %bid.client_ref,
            "Submitting bid"
        );

        let response = self.client.post(&url).json(bid).send().await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        let ack: BidAck = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        info!(bid_id = %ack.bid_id, "Bid accepted");
        Ok(ack)
    }

    /// Trigger a liquidation.
    pub async fn trigger_liquidation(
        &self,
        request: &LiquidationRequest,
    ) -> ApiResult<LiquidationAck> {
        let url = format!("{}/v1/liquidations", self.base_url);
        info!(
            opportunity_id = %request.opportunity_id,
            account = %request.account,
            nonce = request.nonce,
            "Triggering liquidation"
        );

        let response = self.client.post(&url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(classify_error(response).await);
        }
        let ack: LiquidationAck = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        info!(tx_hash = %ack.tx_hash, "Liquidation triggered");
        Ok(ack)
    }

    /// Finalize a settlement.
    ///
    /// Finalization is a race: losing it means the settlement already
    /// happened, so an already-finalized conflict comes back as a successful
    /// ack rather than an error.
    pub async fn finalize(&self, id: &OpportunityId) -> ApiResult<FinalizeAck> {
        let url = format!(
            "{}/v1/settlements/{}/{}/finalize",
            self.base_url,
            id.kind.as_str(),
            id.raw
        );
        info!(opportunity_id = %id, "Finalizing settlement");

        let response = self.client.post(&url).send().await?;
        if !response.status().is_success() {
            return match classify_error(response).await {
                ApiError::AlreadyFinalized(detail) => {
                    info!(opportunity_id = %id, detail = %detail, "Settlement already executed");
                    Ok(FinalizeAck {
                        tx_hash: None,
                        already_executed: true,
                    })
                }
                other => Err(other),
            };
        }
        let ack: FinalizeAck = response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))?;
        Ok(ack)
    }
}
