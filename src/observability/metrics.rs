//! Metrics collection.
//!
//! # Responsibilities
//! - Define engine metrics (cache lookups, upstream failures, fallbacks)
//! - Stay recorder-agnostic: without an installed recorder every call is a no-op
//!
//! # Metrics
//! - `wallet_cache_lookups_total` (counter): cache reads by kind and result
//! - `wallet_cache_entries` (gauge): entries held by the persistent cache
//! - `wallet_upstream_failures_total` (counter): failed external calls by source
//! - `wallet_fallbacks_total` (counter): degraded answers by component

use metrics::{counter, gauge};

/// Record a cache read. `result` is one of `fresh`, `stale`, `miss`.
pub fn record_cache_lookup(kind: &'static str, result: &'static str) {
    counter!("wallet_cache_lookups_total", "kind" => kind, "result" => result).increment(1);
}

/// Record the number of entries held by the cache.
pub fn record_cache_size(size: usize) {
    gauge!("wallet_cache_entries").set(size as f64);
}

/// Record a failed call to an external source (`chain`, `fees`, `probe`).
pub fn record_upstream_failure(source: &'static str) {
    counter!("wallet_upstream_failures_total", "source" => source).increment(1);
}

/// Record a degraded answer served by a component.
pub fn record_fallback(component: &'static str) {
    counter!("wallet_fallbacks_total", "component" => component).increment(1);
}
