//! Chain data gateway: cache first, network second, degrade always.
//!
//! # Resolution order (balance and UTXOs)
//! ```text
//! fresh cache hit          → FreshCache
//! offline                  → stale cache (ignore TTL) or default
//! online                   → live query → cache write → Live
//! live query failed        → stale cache (ignore TTL) or default
//! ```
//!
//! Transport errors never reach the caller; the returned [`Lookup`] says
//! where the value came from.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::chain::cache::{cache_key, BlockchainCache, CacheKind};
use crate::chain::client::ChainClient;
use crate::chain::types::{
    is_txid, Balance, DataSource, Lookup, Network, TransactionStatus, UpstreamResult, Utxo,
};
use crate::config::UpstreamConfig;
use crate::error::{WalletError, WalletResult};
use crate::observability::metrics;

/// Read access to chain data. The validator depends on this seam.
pub trait UtxoSource: Send + Sync {
    fn utxos(
        &self,
        address: &str,
        network: Network,
        offline: bool,
    ) -> impl Future<Output = Lookup<Vec<Utxo>>> + Send;
}

/// Cache-backed access to per-network chain sources.
#[derive(Debug, Clone)]
pub struct ChainGateway {
    cache: Arc<BlockchainCache>,
    mainnet: ChainClient,
    testnet: ChainClient,
}

impl ChainGateway {
    /// Create a gateway owning `cache`, with one client per network.
    pub fn new(cache: Arc<BlockchainCache>, upstream: &UpstreamConfig) -> Self {
        Self {
            mainnet: ChainClient::new(upstream, Network::Main),
            testnet: ChainClient::new(upstream, Network::Test),
            cache,
        }
    }

    /// Create a gateway from prebuilt clients.
    pub fn with_clients(cache: Arc<BlockchainCache>, mainnet: ChainClient, testnet: ChainClient) -> Self {
        Self { cache, mainnet, testnet }
    }

    pub fn cache(&self) -> &Arc<BlockchainCache> {
        &self.cache
    }

    fn client(&self, network: Network) -> &ChainClient {
        match network {
            Network::Main => &self.mainnet,
            Network::Test => &self.testnet,
        }
    }

    /// Balance of `address`, never failing.
    pub async fn get_balance(&self, address: &str, network: Network, offline: bool) -> Lookup<Balance> {
        let client = self.client(network);
        self.resolve(CacheKind::Balance, address, network, offline, client.fetch_balance(address))
            .await
    }

    /// Unspent outputs of `address`, never failing.
    pub async fn get_utxos(&self, address: &str, network: Network, offline: bool) -> Lookup<Vec<Utxo>> {
        let client = self.client(network);
        self.resolve(CacheKind::Utxos, address, network, offline, client.fetch_utxos(address))
            .await
    }

    async fn resolve<T, F>(
        &self,
        kind: CacheKind,
        address: &str,
        network: Network,
        offline: bool,
        fetch: F,
    ) -> Lookup<T>
    where
        T: Serialize + DeserializeOwned + Default,
        F: Future<Output = UpstreamResult<T>>,
    {
        let key = cache_key(kind, network, address);

        if let Some(value) = self.cache.get_as::<T>(&key, false) {
            metrics::record_cache_lookup(kind.as_str(), "fresh");
            tracing::debug!(key = %key, "Serving fresh cache entry");
            return Lookup { value, source: DataSource::FreshCache };
        }

        if offline {
            tracing::info!(address = %address, network = %network, kind = kind.as_str(), "Offline mode, using cached data only");
            return self.degrade(&key, kind);
        }

        match fetch.await {
            Ok(value) => {
                self.cache.set_as(&key, &value);
                tracing::debug!(address = %address, network = %network, kind = kind.as_str(), "Fetched live chain data");
                Lookup { value, source: DataSource::Live }
            }
            Err(e) => {
                metrics::record_upstream_failure("chain");
                tracing::warn!(
                    address = %address,
                    network = %network,
                    kind = kind.as_str(),
                    error = %e,
                    "Chain source failed, falling back to cache"
                );
                self.degrade(&key, kind)
            }
        }
    }

    fn degrade<T>(&self, key: &str, kind: CacheKind) -> Lookup<T>
    where
        T: DeserializeOwned + Default,
    {
        metrics::record_fallback("gateway");
        match self.cache.get_as::<T>(key, true) {
            Some(value) => {
                metrics::record_cache_lookup(kind.as_str(), "stale");
                Lookup { value, source: DataSource::StaleCache }
            }
            None => {
                metrics::record_cache_lookup(kind.as_str(), "miss");
                tracing::warn!(key = %key, "No cached data available, returning default");
                Lookup { value: T::default(), source: DataSource::Default }
            }
        }
    }

    /// Confirmation status of `txid`.
    ///
    /// Offline or on any source failure the status is `unknown`.
    pub async fn get_transaction_status(
        &self,
        txid: &str,
        network: Network,
        offline: bool,
    ) -> WalletResult<TransactionStatus> {
        if !is_txid(txid) {
            return Err(WalletError::InvalidRequest(format!(
                "invalid transaction id '{}': expected 64 hex characters",
                txid
            )));
        }

        if offline {
            tracing::info!(txid = %txid, "Offline mode, transaction status unknown");
            return Ok(TransactionStatus::unknown(txid, network));
        }

        match self.client(network).fetch_transaction_status(txid).await {
            Ok(status) => Ok(status),
            Err(e) => {
                metrics::record_upstream_failure("chain");
                metrics::record_fallback("tx_status");
                tracing::warn!(txid = %txid, network = %network, error = %e, "Transaction status lookup failed");
                Ok(TransactionStatus::unknown(txid, network))
            }
        }
    }

    /// Whether the network's data source answers within the probe deadline.
    pub async fn probe_connectivity(&self, network: Network) -> bool {
        match self.client(network).probe().await {
            Ok(height) => {
                tracing::debug!(network = %network, height, "Connectivity probe succeeded");
                true
            }
            Err(e) => {
                metrics::record_upstream_failure("probe");
                tracing::info!(network = %network, error = %e, "Connectivity probe failed");
                false
            }
        }
    }

    /// Effective offline state: configured offline, or the source is unreachable.
    pub async fn is_offline(&self, configured: bool, network: Network) -> bool {
        if configured {
            return true;
        }
        !self.probe_connectivity(network).await
    }
}

impl UtxoSource for ChainGateway {
    async fn utxos(&self, address: &str, network: Network, offline: bool) -> Lookup<Vec<Utxo>> {
        self.get_utxos(address, network, offline).await
    }
}
