//! Outcome recording.
//!
//! Every terminal processing outcome is recorded for audit. Recording is
//! best-effort: a failed record never aborts or retries the settlement that
//! produced it.

use keeper_core::ProcessingOutcome;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use tracing::{info, warn};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Sink for terminal processing outcomes.
pub trait OutcomeRecorder: Send + Sync {
    /// Record one outcome. Must not fail the caller; errors are swallowed
    /// and logged by the implementation.
    fn record<'a>(&'a self, outcome: &'a ProcessingOutcome) -> BoxFuture<'a, ()>;
}

/// Recorder that writes outcomes to the structured log.
pub struct TracingRecorder;

impl OutcomeRecorder for TracingRecorder {
    fn record<'a>(&'a self, outcome: &'a ProcessingOutcome) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            info!(
                opportunity_id = %outcome.opportunity_id,
                result = %outcome.result,
                detail = ?outcome.detail,
                "Recorded outcome"
            );
        })
    }
}

/// Recorder that POSTs outcomes to an external audit endpoint.
pub struct HttpRecorder {
    client: Client,
    url: String,
}

impl HttpRecorder {
    pub fn new(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
        }
    }
}

impl OutcomeRecorder for HttpRecorder {
    fn record<'a>(&'a self, outcome: &'a ProcessingOutcome) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            let result = self.client.post(&self.url).json(outcome).send().await;
            match result {
                Ok(response) if response.status().is_success() => {}
                Ok(response) => warn!(
                    opportunity_id = %outcome.opportunity_id,
                    status = response.status().as_u16(),
                    "Outcome record rejected"
                ),
                Err(e) => warn!(
                    opportunity_id = %outcome.opportunity_id,
                    error = %e,
                    "Outcome record failed"
                ),
            }
        })
    }
}

/// Recorder that drops everything. Test use.
pub struct NoopRecorder;

impl OutcomeRecorder for NoopRecorder {
    fn record<'a>(&'a self, _outcome: &'a ProcessingOutcome) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
