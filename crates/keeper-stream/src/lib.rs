//! Event-stream client for opportunity push delivery.
//!
//! The stream is a redundancy layer over polling, not the source of truth.
//! Its failure mode is silent degradation to poll-only operation:
//! - `connect()` resolves once the handshake and subscription announcement
//!   succeed, and rejects only on that first attempt;
//! - after an unexpected close, exactly one reconnect timer is armed and
//!   failed reconnects are retried indefinitely without ever raising to
//!   callers;
//! - `disconnect()` is idempotent and cancels any pending reconnect.
//!
//! Inbound frames decode into a closed set of event kinds; unrecognized or
//! malformed frames are dropped at the boundary without closing the
//! connection.

pub mod client;
pub mod error;
pub mod heartbeat;
pub mod message;

pub use client::{EventStreamClient, StreamConfig, StreamState};
pub use error::{StreamError, StreamResult};
pub use message::StreamEvent;

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any stream connections are made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
