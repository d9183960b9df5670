//! Per-account nonce sequencing.
//!
//! One `NonceSequencer` exists per signing account. Every ledger-mutating
//! submission runs inside its exclusive section, which hands out unique,
//! monotonically increasing sequence numbers and resynchronizes from the
//! ledger after any failure.

use crate::error::LedgerError;
use crate::rpc::LedgerRpc;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Ephemeral allocation produced inside the exclusive section and discarded
/// after the submission closure returns.
#[derive(Debug, Clone)]
pub struct TransactionIntent {
    /// Signing account the nonce belongs to.
    pub account: String,
    /// Allocated sequence number.
    pub nonce: u64,
}

/// Cached allocator state. `None` means unknown: the next allocation must be
/// resolved by a ledger query before being served.
#[derive(Debug, Default)]
struct SequencerState {
    current_nonce: Option<u64>,
}

/// Serializes all submissions for one signing account.
///
/// The exclusive section is a `tokio::sync::Mutex`, which queues waiters in
/// FIFO order — no caller waits indefinitely while others cut ahead. The lock
/// is held for the entire query+submit sequence, including confirmation
/// waiting, so no caller can observe a nonce cached by a section that has not
/// completed. The concurrency substrate suspends the holding task without
/// stalling unrelated tasks.
pub struct NonceSequencer {
    account: String,
    rpc: Arc<dyn LedgerRpc>,
    state: Mutex<SequencerState>,
}

impl NonceSequencer {
    pub fn new(account: impl Into<String>, rpc: Arc<dyn LedgerRpc>) -> Self {
        Self {
            account: account.into(),
            rpc,
            state: Mutex::new(SequencerState::default()),
        }
    }

    /// Account this sequencer allocates for.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Run `submit` inside the account's exclusive section.
    ///
    /// 1. Enter the section (FIFO-fair).
    /// 2. If the cached nonce is unknown, query the ledger for the account's
    ///    next usable (pending-inclusive) sequence number and cache it.
    /// 3. Invoke `submit` with the allocated [`TransactionIntent`].
    /// 4. On success, advance the cached nonce by one.
    /// 5. On any failure, mark the cached nonce unknown and propagate.
    ///
    /// Rule 5 is deliberately conservative: a failed submission's actual
    /// ledger effect is unknown (the broadcast may have landed even though
    /// the confirmation wait failed), so the next allocation always starts
    /// from a fresh ledger query — an extra round trip traded for never
    /// duplicating or skipping a number.
    ///
    /// `submit` may fail with any error type that can absorb the nonce
    /// query's [`LedgerError`].
    pub async fn execute_transaction<T, E, F, Fut>(&self, submit: F) -> Result<T, E>
    where
        E: From<LedgerError> + std::fmt::Display,
        F: FnOnce(TransactionIntent) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut state = self.state.lock().await;

        let nonce = match state.current_nonce {
            Some(n) => n,
            None => {
                let n = self.rpc.next_nonce(&self.account).await?;
                debug!(account = %self.account, nonce = n, "Resynced nonce from ledger");
                state.current_nonce = Some(n);
                n
            }
        };

        let intent = TransactionIntent {
            account: self.account.clone(),
            nonce,
        };

        match submit(intent).await {
            Ok(value) => {
                state.current_nonce = Some(nonce + 1);
                Ok(value)
            }
            Err(e) => {
                warn!(
                    account = %self.account,
                    nonce,
                    error = %e,
                    "Submission failed, nonce marked unknown"
                );
                state.current_nonce = None;
                Err(e)
            }
        }
    }

    /// Force the next allocation to re-query the ledger.
    pub async fn invalidate(&self) {
        self.state.lock().await.current_nonce = None;
    }

    /// Currently cached nonce, for diagnostics.
    pub async fn cached_nonce(&self) -> Option<u64> {
        self.state.lock().await.current_nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LedgerResult;
    use crate::rpc::{BoxFuture, Receipt, TxHash};
    use keeper_retry::{run_with_retry, BackoffPolicy};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// In-memory ledger whose `next_nonce` replays a scripted sequence of
    /// values and counts how many times it was queried.
    struct ScriptedLedger {
        nonces: Vec<u64>,
        queries: AtomicU32,
    }

    impl ScriptedLedger {
        fn new(nonces: Vec<u64>) -> Arc<Self> {
            Arc::new(Self {
                nonces,
                queries: AtomicU32::new(0),
            })
        }

        fn query_count(&self) -> u32 {
            self.queries.load(Ordering::SeqCst)
        }
    }

    impl LedgerRpc for ScriptedLedger {
        fn next_nonce<'a>(&'a self, _account: &'a str) -> BoxFuture<'a, LedgerResult<u64>> {
            let idx = self.queries.fetch_add(1, Ordering::SeqCst) as usize;
            let nonce = *self
                .nonces
                .get(idx)
                .or_else(|| self.nonces.last())
                .expect("scripted ledger needs at least one nonce");
            Box::pin(async move { Ok(nonce) })
        }

        fn send_signed_transaction<'a>(
            &'a self,
            _raw_tx: &'a str,
        ) -> BoxFuture<'a, LedgerResult<TxHash>> {
            Box::pin(async { Ok(TxHash("0xtest".to_string())) })
        }

        fn wait_for_confirmation<'a>(
            &'a self,
            hash: &'a TxHash,
            _ceiling: Duration,
        ) -> BoxFuture<'a, LedgerResult<Receipt>> {
            let hash = hash.clone();
            Box::pin(async move {
                Ok(Receipt {
                    tx_hash: hash,
                    block_height: 1,
                    success: true,
                })
            })
        }
    }

    #[tokio::test]
    async fn test_sequential_calls_reuse_cache() {
        let ledger = ScriptedLedger::new(vec![100]);
        let seq = NonceSequencer::new("acct", ledger.clone());

        for expected in 100..103 {
            let used = seq
                .execute_transaction(|intent| async move { Ok::<_, LedgerError>(intent.nonce) })
                .await
                .unwrap();
            assert_eq!(used, expected);
        }

        // Only the first allocation hit the ledger.
        assert_eq!(ledger.query_count(), 1);
        assert_eq!(seq.cached_nonce().await, Some(103));
    }

    #[tokio::test]
    async fn test_concurrent_nonces_gap_free() {
        const TASKS: u64 = 32;
        const BASE: u64 = 500;

        let ledger = ScriptedLedger::new(vec![BASE]);
        let seq = Arc::new(NonceSequencer::new("acct", ledger));

        let mut handles = Vec::new();
        for _ in 0..TASKS {
            let seq = Arc::clone(&seq);
            handles.push(tokio::spawn(async move {
                seq.execute_transaction(|intent| async move { Ok::<_, LedgerError>(intent.nonce) })
                    .await
                    .unwrap()
            }));
        }

        let mut used = Vec::new();
        for h in handles {
            used.push(h.await.unwrap());
        }
        used.sort_unstable();

        let expected: Vec<u64> = (BASE..BASE + TASKS).collect();
        assert_eq!(used, expected, "nonces must form {{base..base+N-1}}");
    }

    #[tokio::test]
    async fn test_failure_marks_nonce_unknown_and_resyncs() {
        // Ledger says 7 at first; after our failed attempt something else
        // lands and the fresh query says 12.
        let ledger = ScriptedLedger::new(vec![7, 12]);
        let seq = NonceSequencer::new("acct", ledger.clone());

        let result: LedgerResult<u64> = seq
            .execute_transaction(|_| async {
                Err(LedgerError::Transport("broadcast timed out".into()))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(seq.cached_nonce().await, None);

        let used = seq
            .execute_transaction(|intent| async move { Ok::<_, LedgerError>(intent.nonce) })
            .await
            .unwrap();
        assert_eq!(used, 12, "next allocation must come from a fresh query");
        assert_eq!(ledger.query_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_tasks_leave_no_gaps_for_successors() {
        // Interleaved success/failure: failures consume no nonce.
        let ledger = ScriptedLedger::new(vec![10, 11, 12]);
        let seq = NonceSequencer::new("acct", ledger.clone());

        let n1 = seq
            .execute_transaction(|i| async move { Ok::<_, LedgerError>(i.nonce) })
            .await
            .unwrap();
        assert_eq!(n1, 10);

        let _ = seq
            .execute_transaction(|_| async {
                Err::<u64, _>(LedgerError::Validation("bad fields".into()))
            })
            .await;

        // Resync returns 11: the failed attempt did not consume a slot.
        let n2 = seq
            .execute_transaction(|i| async move { Ok::<_, LedgerError>(i.nonce) })
            .await
            .unwrap();
        assert_eq!(n2, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_conflict_retries_with_fresh_query() {
        // Scenario: submission conflicts on attempts 1 and 2, succeeds on 3.
        // Each retry must re-query the ledger, and the final nonce must match
        // the freshest query result.
        let ledger = ScriptedLedger::new(vec![5, 8, 10]);
        let seq = NonceSequencer::new("acct", ledger.clone());
        let attempts = AtomicU32::new(0);
        let used = std::sync::Mutex::new(Vec::new());

        let result = run_with_retry(
            &BackoffPolicy::submission(),
            |e: &LedgerError| e.is_retryable_submission(),
            |_| {
                let attempt = attempts.fetch_add(1, Ordering::SeqCst) + 1;
                let used = &used;
                let seq = &seq;
                async move {
                    seq.execute_transaction(|intent| async move {
                        used.lock().unwrap().push(intent.nonce);
                        if attempt < 3 {
                            Err(LedgerError::SequenceConflict(format!(
                                "sequence {} already used",
                                intent.nonce
                            )))
                        } else {
                            Ok(intent.nonce)
                        }
                    })
                    .await
                }
            },
        )
        .await;

        assert_eq!(result.unwrap(), 10);
        assert_eq!(*used.lock().unwrap(), vec![5, 8, 10]);
        assert_eq!(ledger.query_count(), 3, "every retry re-queried the ledger");
    }
}
