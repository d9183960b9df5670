//! Settlement agent binary crate: configuration, logging, and the
//! application assembly that wires the engine, ledger, stream, and APIs.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;

pub use app::Application;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
