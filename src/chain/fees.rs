//! Fee-rate estimation with a short-lived per-network cache.
//!
//! Estimates come from a mempool.space-style `fees/recommended` endpoint.
//! When the source is unreachable (or the caller is offline) a jittered
//! heuristic is returned instead; heuristic estimates are never cached.

use dashmap::DashMap;
use rand::Rng;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::chain::types::{Network, UpstreamError, UpstreamResult};
use crate::config::FeeConfig;
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Unit reported with every estimate.
pub const FEE_UNIT: &str = "sat/vB";

/// Origin of a fee estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSource {
    Mempool,
    Fallback,
}

/// Fee rates by priority, in sat/vB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeEstimate {
    pub high: f64,
    pub medium: f64,
    pub low: f64,
    pub min: f64,
    /// Epoch seconds at which the estimate was produced.
    pub timestamp: u64,
    pub unit: String,
    pub source: FeeSource,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecommendedFees {
    #[serde(default = "default_fastest")]
    fastest_fee: f64,
    #[serde(default = "default_half_hour")]
    half_hour_fee: f64,
    #[serde(default = "default_hour")]
    hour_fee: f64,
    #[serde(default = "default_economy")]
    economy_fee: f64,
}

fn default_fastest() -> f64 { 10.0 }
fn default_half_hour() -> f64 { 5.0 }
fn default_hour() -> f64 { 5.0 }
fn default_economy() -> f64 { 1.0 }

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Fee estimator. Cheap to clone; clones share the cache.
#[derive(Debug, Clone)]
pub struct FeeEstimator {
    http: Client,
    config: FeeConfig,
    cache: Arc<DashMap<Network, (Instant, FeeEstimate)>>,
}

impl FeeEstimator {
    pub fn new(config: FeeConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "Failed to build fee HTTP client, using defaults");
                Client::new()
            });
        Self::with_http(http, config)
    }

    pub fn with_http(http: Client, config: FeeConfig) -> Self {
        Self {
            http,
            config,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Current fee estimate for `network`. Never fails.
    pub async fn estimate(&self, network: Network, offline: bool) -> FeeEstimate {
        if let Some(entry) = self.cache.get(&network) {
            let (fetched_at, estimate) = entry.value();
            if fetched_at.elapsed() < Duration::from_secs(self.config.cache_secs) {
                tracing::debug!(network = %network, "Using cached fee estimate");
                return estimate.clone();
            }
        }

        if offline {
            tracing::info!(network = %network, "Offline mode, using heuristic fee estimate");
            metrics::record_fallback("fees");
            return fallback_estimate(network);
        }

        match self.fetch(network).await {
            Ok(estimate) => {
                self.cache.insert(network, (Instant::now(), estimate.clone()));
                estimate
            }
            Err(e) => {
                metrics::record_upstream_failure("fees");
                metrics::record_fallback("fees");
                tracing::warn!(network = %network, error = %e, "Fee source failed, using heuristic estimate");
                fallback_estimate(network)
            }
        }
    }

    async fn fetch(&self, network: Network) -> UpstreamResult<FeeEstimate> {
        let url = self.config.url(network);
        tracing::info!(network = %network, url = %url, "Querying fee source");

        let deadline = Duration::from_secs(self.config.request_timeout_secs);
        let fees: RecommendedFees = with_deadline(deadline, async {
            let response = self
                .http
                .get(url)
                .send()
                .await
                .map_err(|e| UpstreamError::Http(e.to_string()))?;
            if !response.status().is_success() {
                return Err(UpstreamError::Status {
                    status: response.status().as_u16(),
                    url: url.to_string(),
                });
            }
            response
                .json()
                .await
                .map_err(|e| UpstreamError::Decode(e.to_string()))
        })
        .await?;

        Ok(FeeEstimate {
            high: fees.fastest_fee,
            medium: fees.half_hour_fee,
            low: fees.economy_fee,
            min: fees.hour_fee,
            timestamp: epoch_secs(),
            unit: FEE_UNIT.to_string(),
            source: FeeSource::Mempool,
        })
    }
}

/// Heuristic estimate around a per-network base rate.
pub fn fallback_estimate(network: Network) -> FeeEstimate {
    let base = match network {
        Network::Main => 5.0,
        Network::Test => 1.0,
    };
    let mut rng = rand::thread_rng();

    let high = f64::max(1.0, base * 2.0 + rng.gen_range(-0.5..=0.5));
    let medium = f64::max(1.0, base + rng.gen_range(-0.3..=0.3));
    let low = f64::max(0.5, base / 2.0 + rng.gen_range(-0.1..=0.1));

    FeeEstimate {
        high,
        medium,
        low,
        min: medium,
        timestamp: epoch_secs(),
        unit: FEE_UNIT.to_string(),
        source: FeeSource::Fallback,
    }
}
