//! At-most-once claim cache.
//!
//! Opportunities arrive redundantly from the push stream and the poller.
//! Whichever channel observes one first claims it here; every later
//! observation of the same id is a duplicate and does no work. A claim is
//! terminal: skips and failures stand, they are never reprocessed on a
//! later re-observation inside the TTL window.

use chrono::{DateTime, Duration, Utc};
use keeper_core::OpportunityId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Cache bounds.
#[derive(Debug, Clone)]
pub struct DedupConfig {
    /// How long a claim stays in the window.
    pub ttl: Duration,
    /// Hard entry cap; oldest claims are evicted past it.
    pub max_entries: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(30),
            max_entries: 10_000,
        }
    }
}

/// Map and insertion-order queue move together: every id present in
/// `entries` appears exactly once in `order`, and `claim` is the only
/// writer that adds.
#[derive(Debug, Default)]
struct DedupInner {
    entries: HashMap<OpportunityId, DateTime<Utc>>,
    order: VecDeque<OpportunityId>,
}

/// Bounded, TTL-windowed claim cache.
///
/// All operations run under one mutex over in-memory state, so `claim` is an
/// atomic test-and-mark: of N concurrent claims for the same id, exactly one
/// returns true.
pub struct DedupCache {
    config: DedupConfig,
    inner: Mutex<DedupInner>,
}

impl DedupCache {
    pub fn new(config: DedupConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(DedupInner::default()),
        }
    }

    /// Claim `id` at `now`. True iff this call is the first claimant.
    pub fn claim(&self, id: &OpportunityId, now: DateTime<Utc>) -> bool {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(id) {
            return false;
        }
        inner.entries.insert(id.clone(), now);
        inner.order.push_back(id.clone());
        true
    }

    /// Drop expired claims, then evict oldest-first down to the cap.
    ///
    /// After a sweep no entry is older than the TTL, the size is within
    /// `max_entries`, and the newest entries are the ones retained.
    pub fn sweep(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();

        while let Some(oldest) = inner.order.front() {
            let expired = inner
                .entries
                .get(oldest)
                .is_some_and(|first_seen| now - *first_seen >= self.config.ttl);
            if !expired {
                break;
            }
            let id = inner.order.pop_front().expect("front checked above");
            inner.entries.remove(&id);
        }

        while inner.entries.len() > self.config.max_entries {
            let id = inner.order.pop_front().expect("order tracks entries");
            inner.entries.remove(&id);
        }

        let dropped = before - inner.entries.len();
        if dropped > 0 {
            debug!(dropped, remaining = inner.entries.len(), "Swept claim cache");
        }
    }

    /// Number of live claims.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
