//! Application configuration.

use crate::error::{AppError, AppResult};
use keeper_core::ChainId;
use keeper_engine::{DedupConfig, EligibilityConfig, RuntimeConfig};
use keeper_stream::StreamConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Opportunity source API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Base URL of the source API.
    pub base_url: String,
    /// Pending-opportunity poll interval (seconds).
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval_secs() -> u64 {
    15
}

/// Settlement submission API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionConfig {
    pub base_url: String,
}

/// Opportunity stream subscription.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamSectionConfig {
    /// WebSocket URL of the opportunity stream.
    pub url: String,
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    #[serde(default = "default_heartbeat_timeout_ms")]
    pub heartbeat_timeout_ms: u64,
}

fn default_channels() -> Vec<String> {
    vec!["opportunities".to_string()]
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_handshake_timeout_ms() -> u64 {
    5000
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_heartbeat_timeout_ms() -> u64 {
    10_000
}

impl StreamSectionConfig {
    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            url: self.url.clone(),
            channels: self.channels.clone(),
            reconnect_delay_ms: self.reconnect_delay_ms,
            handshake_timeout_ms: self.handshake_timeout_ms,
            heartbeat_interval_ms: self.heartbeat_interval_ms,
            heartbeat_timeout_ms: self.heartbeat_timeout_ms,
        }
    }
}

/// Ledger RPC and signing account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    pub rpc_url: String,
    /// Signing account all settlements are sequenced on.
    pub account: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_confirmation_timeout_secs")]
    pub confirmation_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_confirmation_timeout_secs() -> u64 {
    60
}

/// Source of the signing key. Exactly one of `key_env` / `key_file` must be
/// set; never put key material in the config file itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SignerConfig {
    /// Environment variable holding the hex-encoded private key.
    #[serde(default)]
    pub key_env: Option<String>,
    /// File holding the hex-encoded private key (recommend 0600 permissions).
    #[serde(default)]
    pub key_file: Option<PathBuf>,
    /// If set, the derived address must match or startup fails.
    #[serde(default)]
    pub expected_address: Option<String>,
}

/// Claim cache bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DedupSectionConfig {
    #[serde(default = "default_dedup_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_dedup_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_dedup_ttl_secs() -> u64 {
    1800
}

fn default_dedup_max_entries() -> usize {
    10_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

impl Default for DedupSectionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_dedup_ttl_secs(),
            max_entries: default_dedup_max_entries(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl DedupSectionConfig {
    pub fn to_dedup_config(&self) -> DedupConfig {
        DedupConfig {
            ttl: chrono::Duration::seconds(self.ttl_secs as i64),
            max_entries: self.max_entries,
        }
    }
}

/// Shared eligibility gates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EligibilitySectionConfig {
    pub allowed_assets: Vec<String>,
    pub min_size: Decimal,
    pub supported_chains: Vec<String>,
    #[serde(default = "default_min_time_to_expiry_secs")]
    pub min_time_to_expiry_secs: u64,
}

fn default_min_time_to_expiry_secs() -> u64 {
    10
}

impl EligibilitySectionConfig {
    pub fn to_eligibility_config(&self) -> EligibilityConfig {
        EligibilityConfig {
            allowed_assets: self.allowed_assets.clone(),
            min_size: self.min_size,
            supported_chains: self
                .supported_chains
                .iter()
                .map(|c| ChainId::new(c.clone()))
                .collect(),
            min_time_to_expiry: chrono::Duration::seconds(self.min_time_to_expiry_secs as i64),
        }
    }
}

/// Pricing knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Spread applied around the RFQ reference price, in basis points.
    #[serde(default = "default_rfq_spread_bps")]
    pub rfq_spread_bps: Decimal,
}

fn default_rfq_spread_bps() -> Decimal {
    Decimal::new(5, 0)
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rfq_spread_bps: default_rfq_spread_bps(),
        }
    }
}

/// Outcome recording.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecorderConfig {
    /// Audit endpoint; outcomes go to the structured log when unset.
    #[serde(default)]
    pub outcome_url: Option<String>,
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub submission: SubmissionConfig,
    pub stream: StreamSectionConfig,
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub signer: SignerConfig,
    #[serde(default)]
    pub dedup: DedupSectionConfig,
    pub eligibility: EligibilitySectionConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub recorder: RecorderConfig,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.source.base_url.is_empty() {
            return Err(AppError::Config("source.base_url is empty".to_string()));
        }
        if self.submission.base_url.is_empty() {
            return Err(AppError::Config("submission.base_url is empty".to_string()));
        }
        if self.ledger.rpc_url.is_empty() || self.ledger.account.is_empty() {
            return Err(AppError::Config(
                "ledger.rpc_url and ledger.account are required".to_string(),
            ));
        }
        if self.signer.key_env.is_none() && self.signer.key_file.is_none() {
            return Err(AppError::Config(
                "one of signer.key_env or signer.key_file is required".to_string(),
            ));
        }
        if self.eligibility.allowed_assets.is_empty() {
            return Err(AppError::Config(
                "eligibility.allowed_assets must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn runtime_config(&self) -> RuntimeConfig {
        RuntimeConfig {
            poll_interval: Duration::from_secs(self.source.poll_interval_secs),
            sweep_interval: Duration::from_secs(self.dedup.sweep_interval_secs),
        }
    }
}
