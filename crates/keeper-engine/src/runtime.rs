//! Engine loops: poller, stream consumer, sweeper.
//!
//! All three run until the shared [`CancellationToken`] fires. Cancellation
//! stops loops from starting new work; an opportunity already inside the
//! sequencer's exclusive section finishes before `run` returns.

use crate::dedup::DedupCache;
use crate::metrics;
use crate::processor::OpportunityProcessor;
use keeper_api::{ApiError, SourceClient};
use keeper_core::OpportunityFilter;
use keeper_retry::{run_with_retry, BackoffPolicy};
use keeper_stream::StreamEvent;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub poll_interval: Duration,
    pub sweep_interval: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(15),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// Owns the engine's long-running loops.
pub struct EngineRuntime {
    processor: Arc<OpportunityProcessor>,
    source: Arc<SourceClient>,
    filter: OpportunityFilter,
    dedup: Arc<DedupCache>,
    api_policy: BackoffPolicy,
    config: RuntimeConfig,
    token: CancellationToken,
}

impl EngineRuntime {
    pub fn new(
        processor: Arc<OpportunityProcessor>,
        source: Arc<SourceClient>,
        filter: OpportunityFilter,
        dedup: Arc<DedupCache>,
        config: RuntimeConfig,
        token: CancellationToken,
    ) -> Self {
        Self {
            processor,
            source,
            filter,
            dedup,
            api_policy: BackoffPolicy::api(),
            config,
            token,
        }
    }

    /// Run all loops to completion. Returns after cancellation has drained
    /// in-flight work.
    pub async fn run(&self, events: mpsc::Receiver<StreamEvent>) {
        tokio::join!(
            self.poll_loop(),
            self.stream_loop(events),
            self.sweep_loop()
        );
        info!("Engine runtime stopped");
    }

    async fn poll_loop(&self) {
        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.token.cancelled() => break,
                _ = ticker.tick() => self.poll_once().await,
            }
        }
        debug!("Poll loop stopped");
    }

    async fn poll_once(&self) {
        let result = run_with_retry(
            &self.api_policy,
            |e: &ApiError| e.is_retryable(),
            |_| self.source.list_pending(&self.filter),
        )
        .await;

        match result {
            Ok(ops) => {
                for op in &ops {
                    if self.token.is_cancelled() {
                        return;
                    }
                    self.processor.on_observed(op, "poll").await;
                }
            }
            Err(e) => warn!(error = %e, "Pending opportunity poll failed"),
        }
    }

    async fn stream_loop(&self, mut events: mpsc::Receiver<StreamEvent>) {
        loop {
            tokio::select! {
                () = self.token.cancelled() => break,
                event = events.recv() => match event {
                    Some(StreamEvent::Observed(op)) => {
                        self.processor.on_observed(&op, "stream").await;
                    }
                    Some(StreamEvent::Resolved(id)) => self.processor.on_resolved(&id),
                    None => {
                        debug!("Stream event channel closed");
                        break;
                    }
                },
            }
        }
        debug!("Stream consumer stopped");
    }

    async fn sweep_loop(&self) {
        let mut ticker = tokio::time::interval(self.config.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = self.token.cancelled() => break,
                _ = ticker.tick() => {
                    self.dedup.sweep(chrono::Utc::now());
                    metrics::DEDUP_SIZE.set(self.dedup.len() as i64);
                }
            }
        }
        debug!("Sweep loop stopped");
    }
}
