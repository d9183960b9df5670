//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("API error: {0}")]
    Api(#[from] keeper_api::ApiError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] keeper_ledger::LedgerError),

    #[error("Stream error: {0}")]
    Stream(#[from] keeper_stream::StreamError),

    #[error("Signer error: {0}")]
    Signer(#[from] keeper_api::SignerError),

    #[error("Preflight failed: {0}")]
    Preflight(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
