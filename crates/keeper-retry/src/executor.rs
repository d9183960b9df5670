//! Generic retry executor.

use crate::backoff::BackoffPolicy;
use std::future::Future;
use tracing::warn;

/// Run `op` under the given policy.
///
/// `op` receives the 1-based attempt number. After a failure the error is
/// passed to `is_retryable`; when it returns false, or when attempts are
/// exhausted, the last error is propagated. Otherwise the executor sleeps the
/// current backoff delay and tries again.
///
/// The sleep is a plain `tokio::time::sleep`, so a caller that needs
/// cancellation wraps the whole call in a `select!` — individual attempts are
/// never interrupted mid-flight.
pub async fn run_with_retry<T, E, Op, Fut>(
    policy: &BackoffPolicy,
    is_retryable: impl Fn(&E) -> bool,
    mut op: Op,
) -> Result<T, E>
where
    E: std::fmt::Display,
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 1u32;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if attempt >= policy.max_attempts || !is_retryable(&err) {
                    return Err(err);
                }
                let delay = policy.delay_for(attempt);
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Retryable failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
