//! Ledger access for keeper.
//!
//! Two concerns live here:
//! - `rpc`: a thin JSON-RPC client for the ledger (next nonce, raw
//!   transaction submission, confirmation polling);
//! - `sequencer`: the per-account `NonceSequencer` that serializes all
//!   ledger-mutating submissions so each receives a unique, gap-free
//!   sequence number, resynchronizing after any failure.

pub mod error;
pub mod rpc;
pub mod sequencer;

pub use error::{LedgerError, LedgerResult};
pub use rpc::{BoxFuture, HttpLedgerRpc, LedgerRpc, Receipt, TxHash};
pub use sequencer::{NonceSequencer, TransactionIntent};
