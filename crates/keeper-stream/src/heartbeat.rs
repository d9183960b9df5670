//! Connection health monitoring.
//!
//! Tracks ping/pong timing and message activity so the read loop can detect
//! a dead peer and hand the connection to the reconnect path.

use parking_lot::RwLock;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug)]
struct HeartbeatInner {
    last_ping: Option<Instant>,
    waiting_for_pong: bool,
    last_activity: Instant,
}

/// Heartbeat monitor for one stream connection.
pub struct HeartbeatMonitor {
    interval: Duration,
    timeout: Duration,
    inner: RwLock<HeartbeatInner>,
}

impl HeartbeatMonitor {
    pub fn new(interval_ms: u64, timeout_ms: u64) -> Self {
        Self {
            interval: Duration::from_millis(interval_ms),
            timeout: Duration::from_millis(timeout_ms),
            inner: RwLock::new(HeartbeatInner {
                last_ping: None,
                waiting_for_pong: false,
                last_activity: Instant::now(),
            }),
        }
    }

    /// Reset state (called on each successful connection).
    pub fn reset(&self) {
        let mut inner = self.inner.write();
        inner.last_ping = None;
        inner.waiting_for_pong = false;
        inner.last_activity = Instant::now();
    }

    pub fn record_ping(&self) {
        let mut inner = self.inner.write();
        inner.last_ping = Some(Instant::now());
        inner.waiting_for_pong = true;
    }

    pub fn record_pong(&self) {
        let mut inner = self.inner.write();
        if let Some(ping) = inner.last_ping {
            debug!(rtt_ms = ping.elapsed().as_millis() as u64, "Received pong");
        }
        inner.waiting_for_pong = false;
    }

    /// Record any inbound traffic.
    pub fn record_activity(&self) {
        self.inner.write().last_activity = Instant::now();
    }

    /// True when an outstanding ping went unanswered past the timeout.
    pub fn is_timed_out(&self) -> bool {
        let inner = self.inner.read();
        match (inner.waiting_for_pong, inner.last_ping) {
            (true, Some(ping)) => ping.elapsed() > self.timeout,
            _ => false,
        }
    }

    /// True when the connection has been idle long enough to warrant a ping.
    pub fn should_ping(&self) -> bool {
        let inner = self.inner.read();
        !inner.waiting_for_pong && inner.last_activity.elapsed() >= self.interval
    }

    /// Sleep until the next health check.
    pub async fn tick(&self) {
        tokio::time::sleep(self.interval / 2).await;
    }
}
