//! Application assembly and lifecycle.
//!
//! `Application::new` wires every long-lived component from configuration,
//! `run_preflight` verifies reachability of the ledger and the opportunity
//! source before any settlement work starts, and `run` drives the engine
//! loops until Ctrl-C.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use keeper_api::{
    HttpRecorder, LocalOrderSigner, OrderSigner, OutcomeRecorder, SourceClient, SubmissionClient,
    TracingRecorder,
};
use keeper_core::OpportunityFilter;
use keeper_engine::{
    DedupCache, EngineRuntime, LiquidationStrategy, OpportunityProcessor, RfqStrategy,
};
use keeper_ledger::{HttpLedgerRpc, LedgerRpc, NonceSequencer};
use keeper_retry::BackoffPolicy;
use keeper_stream::EventStreamClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Capacity of the stream-to-engine event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct Application {
    config: AppConfig,
    processor: Arc<OpportunityProcessor>,
    source: Arc<SourceClient>,
    dedup: Arc<DedupCache>,
    rpc: Arc<dyn LedgerRpc>,
    token: CancellationToken,
}

impl Application {
    /// Build every component from configuration. Fails fast on a bad key,
    /// an address mismatch, or a malformed endpoint.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let key = load_signing_key(&config)?;
        let signer: Arc<dyn OrderSigner> = Arc::new(LocalOrderSigner::from_hex_key(
            &key,
            config.signer.expected_address.as_deref(),
        )?);
        info!(address = signer.address(), "Signer loaded");

        let source = Arc::new(SourceClient::new(&config.source.base_url)?);
        let submission = Arc::new(SubmissionClient::new(&config.submission.base_url)?);

        let rpc: Arc<dyn LedgerRpc> = Arc::new(HttpLedgerRpc::new(
            &config.ledger.rpc_url,
            Duration::from_secs(config.ledger.request_timeout_secs),
        )?);
        let sequencer = Arc::new(NonceSequencer::new(
            config.ledger.account.clone(),
            Arc::clone(&rpc),
        ));

        let dedup = Arc::new(DedupCache::new(config.dedup.to_dedup_config()));

        let rfq = Arc::new(RfqStrategy::new(
            Arc::clone(&signer),
            Arc::clone(&submission),
            config.pricing.rfq_spread_bps,
        ));
        let liquidation = Arc::new(LiquidationStrategy::new(
            signer,
            submission,
            Arc::clone(&rpc),
            Duration::from_secs(config.ledger.confirmation_timeout_secs),
        ));

        let recorder: Arc<dyn OutcomeRecorder> = match &config.recorder.outcome_url {
            Some(url) => Arc::new(HttpRecorder::new(url)),
            None => Arc::new(TracingRecorder),
        };

        let processor = Arc::new(OpportunityProcessor::new(
            Arc::clone(&dedup),
            config.eligibility.to_eligibility_config(),
            sequencer,
            rfq,
            liquidation,
            recorder,
            BackoffPolicy::submission(),
        ));

        Ok(Self {
            config,
            processor,
            source,
            dedup,
            rpc,
            token: CancellationToken::new(),
        })
    }

    /// Verify the ledger RPC and the opportunity source answer before the
    /// engine starts claiming opportunities.
    pub async fn run_preflight(&self) -> AppResult<()> {
        self.rpc
            .next_nonce(&self.config.ledger.account)
            .await
            .map_err(|e| AppError::Preflight(format!("ledger nonce query failed: {e}")))?;
        info!(account = %self.config.ledger.account, "Ledger RPC reachable");

        self.source
            .probe()
            .await
            .map_err(|e| AppError::Preflight(format!("opportunity source probe failed: {e}")))?;
        info!("Opportunity source reachable");

        Ok(())
    }

    /// Run until Ctrl-C, then drain in-flight work and return.
    pub async fn run(&self) -> AppResult<()> {
        let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let stream = Arc::new(EventStreamClient::new(
            self.config.stream.to_stream_config(),
            event_tx,
        ));
        // The stream is a redundancy layer; polling alone still settles
        // every opportunity, just with higher latency.
        if let Err(e) = stream.connect().await {
            warn!(error = %e, "Stream unavailable, continuing in poll-only mode");
        }

        let runtime = EngineRuntime::new(
            Arc::clone(&self.processor),
            Arc::clone(&self.source),
            OpportunityFilter::default(),
            Arc::clone(&self.dedup),
            self.config.runtime_config(),
            self.token.clone(),
        );
        let engine = tokio::spawn(async move { runtime.run(event_rx).await });

        tokio::signal::ctrl_c().await?;
        info!("Shutdown signal received, draining in-flight work");

        self.token.cancel();
        stream.disconnect();

        if let Err(e) = engine.await {
            error!(error = %e, "Engine task aborted");
        }
        info!("Shutdown complete");
        Ok(())
    }
}

fn load_signing_key(config: &AppConfig) -> AppResult<String> {
    if let Some(var) = &config.signer.key_env {
        return std::env::var(var).map_err(|_| {
            AppError::Config(format!("environment variable {var} is not set"))
        });
    }
    if let Some(path) = &config.signer.key_file {
        let key = std::fs::read_to_string(path)?;
        return Ok(key.trim().to_string());
    }
    Err(AppError::Config(
        "no signing key source configured".to_string(),
    ))
}
