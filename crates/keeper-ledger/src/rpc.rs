//! JSON-RPC client for the ledger.
//!
//! The agent needs three calls: the next usable (pending-inclusive) sequence
//! number for an account, raw transaction submission, and receipt polling
//! with an explicit confirmation ceiling.

use crate::error::{LedgerError, LedgerResult};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::time::Duration;
use tracing::{debug, warn};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// Transaction hash as returned by the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxHash(pub String);

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Confirmation receipt.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block_height: u64,
    pub success: bool,
}

/// Ledger RPC surface consumed by the sequencer and the strategies.
///
/// Dyn-compatible via boxed futures so collaborators can hold
/// `Arc<dyn LedgerRpc>` and tests can substitute in-memory ledgers.
pub trait LedgerRpc: Send + Sync {
    /// Next usable sequence number for the account, pending-inclusive.
    fn next_nonce<'a>(&'a self, account: &'a str) -> BoxFuture<'a, LedgerResult<u64>>;

    /// Broadcast a signed transaction, returning its hash.
    fn send_signed_transaction<'a>(&'a self, raw_tx: &'a str) -> BoxFuture<'a, LedgerResult<TxHash>>;

    /// Poll for a receipt until `ceiling` elapses.
    ///
    /// A timeout does not imply the transaction was abandoned — it may still
    /// land, which is why the sequencer resyncs after this error.
    fn wait_for_confirmation<'a>(
        &'a self,
        hash: &'a TxHash,
        ceiling: Duration,
    ) -> BoxFuture<'a, LedgerResult<Receipt>>;
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Map an RPC-level error body onto the taxonomy.
///
/// Ledgers report nonce trouble with dedicated codes but gateways sometimes
/// collapse them into generic codes, so the message text is checked as well.
fn classify_rpc_error(code: i64, message: String) -> LedgerError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("sequence") || lower.contains("nonce too low") {
        return LedgerError::SequenceConflict(message);
    }
    if lower.contains("underpriced") {
        return LedgerError::ReplacementUnderpriced(message);
    }
    if lower.contains("invalid") || lower.contains("malformed") {
        return LedgerError::Validation(message);
    }
    LedgerError::Rpc { code, message }
}

/// Receipt poll interval.
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// HTTP JSON-RPC implementation of [`LedgerRpc`].
pub struct HttpLedgerRpc {
    client: Client,
    url: String,
}

impl HttpLedgerRpc {
    /// Create a client against the given RPC endpoint.
    pub fn new(url: impl Into<String>, request_timeout: Duration) -> LedgerResult<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| LedgerError::Transport(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn call(&self, method: &str, params: serde_json::Value) -> LedgerResult<serde_json::Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method,
            params,
        };

        let response = self.client.post(&self.url).json(&request).send().await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(LedgerError::RateLimited);
        }
        if status.is_server_error() {
            return Err(LedgerError::Server {
                status: status.as_u16(),
            });
        }

        let body: RpcResponse = response.json().await?;
        if let Some(err) = body.error {
            return Err(classify_rpc_error(err.code, err.message));
        }
        body.result.ok_or_else(|| LedgerError::Rpc {
            code: 0,
            message: "response carried neither result nor error".to_string(),
        })
    }

    async fn get_receipt(&self, hash: &TxHash) -> LedgerResult<Option<Receipt>> {
        let result = self
            .call("tx_getReceipt", serde_json::json!([hash.0]))
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(result)?))
    }
}

impl LedgerRpc for HttpLedgerRpc {
    fn next_nonce<'a>(&'a self, account: &'a str) -> BoxFuture<'a, LedgerResult<u64>> {
        Box::pin(async move {
            let result = self
                .call("account_nextNonce", serde_json::json!([account]))
                .await?;
            let nonce = result.as_u64().ok_or_else(|| LedgerError::Rpc {
                code: 0,
                message: format!("nextNonce returned non-integer: {result}"),
            })?;
            debug!(account, nonce, "Fetched next nonce from ledger");
            Ok(nonce)
        })
    }

    fn send_signed_transaction<'a>(&'a self, raw_tx: &'a str) -> BoxFuture<'a, LedgerResult<TxHash>> {
        Box::pin(async move {
            let result = self
                .call("tx_sendRaw", serde_json::json!([raw_tx]))
                .await?;
            let hash: TxHash = serde_json::from_value(result)?;
            debug!(%hash, "Transaction broadcast");
            Ok(hash)
        })
    }

    fn wait_for_confirmation<'a>(
        &'a self,
        hash: &'a TxHash,
        ceiling: Duration,
    ) -> BoxFuture<'a, LedgerResult<Receipt>> {
        Box::pin(async move {
            let start = tokio::time::Instant::now();
            loop {
                match self.get_receipt(hash).await {
                    Ok(Some(receipt)) => {
                        debug!(%hash, block = receipt.block_height, "Transaction confirmed");
                        return Ok(receipt);
                    }
                    Ok(None) => {}
                    // Transient polling trouble is tolerated until the ceiling;
                    // the receipt may appear on the next poll.
                    Err(e) if e.is_transient() => {
                        warn!(%hash, error = %e, "Receipt poll failed, will retry")
                    }
                    Err(e) => return Err(e),
                }

                if start.elapsed() + RECEIPT_POLL_INTERVAL > ceiling {
                    return Err(LedgerError::ConfirmationTimeout {
                        hash: hash.0.clone(),
                        waited_ms: start.elapsed().as_millis() as u64,
                    });
                }
                tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
            }
        })
    }
}
