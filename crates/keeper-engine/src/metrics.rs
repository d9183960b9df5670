//! Prometheus metrics for the settlement engine.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally: a registration failure
//! means duplicate metric names, which should crash at startup rather than
//! fail silently. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{register_counter_vec, register_int_gauge, CounterVec, IntGauge};

/// Opportunities observed, by kind and channel (stream/poll).
pub static OPPORTUNITIES_OBSERVED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_opportunities_observed_total",
        "Opportunities observed before deduplication",
        &["kind", "channel"]
    )
    .unwrap()
});

/// Claims won (first observation of an id within the window).
pub static CLAIMS_WON: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_claims_won_total",
        "Opportunities claimed for processing",
        &["kind"]
    )
    .unwrap()
});

/// Duplicate observations dropped by the claim cache.
pub static DUPLICATES_DROPPED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_duplicates_dropped_total",
        "Observations dropped as duplicates",
        &["kind"]
    )
    .unwrap()
});

/// Claimed opportunities skipped by eligibility or strategy gates.
pub static SKIPS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_skips_total",
        "Claimed opportunities skipped",
        &["kind", "reason"]
    )
    .unwrap()
});

/// Settlements submitted successfully.
pub static SUBMISSIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_submissions_total",
        "Settlements submitted",
        &["kind"]
    )
    .unwrap()
});

/// Claimed opportunities that ended in failure.
pub static FAILURES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "keeper_failures_total",
        "Claimed opportunities that failed",
        &["kind"]
    )
    .unwrap()
});

/// Live entries in the claim cache.
pub static DEDUP_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("keeper_dedup_entries", "Live claim cache entries").unwrap()
});
