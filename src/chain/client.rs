//! HTTP client for chain data sources.
//!
//! # Responsibilities
//! - Query balance, UTXOs and transaction status for one network
//! - Normalize the source's response shape into the canonical types
//! - Bound every request with a deadline
//!
//! Errors are returned as [`UpstreamError`]; the gateway decides how to degrade.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::chain::types::{
    Balance, Network, TransactionStatus, TxState, UpstreamError, UpstreamResult, Utxo,
};
use crate::config::{ApiFlavor, EndpointConfig, UpstreamConfig};
use crate::resilience::timeouts::with_deadline;

/// Client for a single network's data source.
#[derive(Debug, Clone)]
pub struct ChainClient {
    http: Client,
    base_url: String,
    flavor: ApiFlavor,
    network: Network,
    timeout: Duration,
    probe_timeout: Duration,
}

impl ChainClient {
    /// Build a client for `network` from the upstream configuration.
    ///
    /// If the configured HTTP client cannot be built, a default client is
    /// used; every request is still bounded by its deadline.
    pub fn new(config: &UpstreamConfig, network: Network) -> Self {
        let endpoint = config.endpoint(network);
        let timeout = config.request_timeout();

        let mut builder = Client::builder().timeout(timeout);
        if !config.use_system_proxy {
            builder = builder.no_proxy();
        }
        let http = builder.build().unwrap_or_else(|e| {
            tracing::warn!(network = %network, error = %e, "Failed to build chain HTTP client, using defaults");
            Client::new()
        });

        Self::with_http(
            http,
            endpoint,
            network,
            timeout,
            Duration::from_secs(config.probe_timeout_secs),
        )
    }

    /// Build a client around an existing `reqwest::Client`.
    pub fn with_http(
        http: Client,
        endpoint: &EndpointConfig,
        network: Network,
        timeout: Duration,
        probe_timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: endpoint.base_url.trim_end_matches('/').to_string(),
            flavor: endpoint.flavor,
            network,
            timeout,
            probe_timeout,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Confirmed and unconfirmed balance of `address`.
    pub async fn fetch_balance(&self, address: &str) -> UpstreamResult<Balance> {
        match self.flavor {
            ApiFlavor::Esplora => {
                let info: EsploraAddress = self.get_json(&["address", address]).await?;
                Ok(Balance {
                    confirmed: info.chain_stats.net(),
                    unconfirmed: info.mempool_stats.net(),
                })
            }
            ApiFlavor::Canonical => self.get_json(&["address", address, "balance"]).await,
        }
    }

    /// Unspent outputs of `address`, with the address filled in.
    pub async fn fetch_utxos(&self, address: &str) -> UpstreamResult<Vec<Utxo>> {
        let path = ["address", address, "utxo"];
        let utxos = match self.flavor {
            ApiFlavor::Esplora => {
                let raw: Vec<EsploraUtxo> = self.get_json(&path).await?;
                raw.into_iter().map(EsploraUtxo::into_utxo).collect()
            }
            ApiFlavor::Canonical => self.get_json::<Vec<Utxo>>(&path).await?,
        };

        Ok(utxos
            .into_iter()
            .map(|mut utxo| {
                if utxo.address.is_empty() {
                    utxo.address = address.to_string();
                }
                utxo
            })
            .collect())
    }

    /// Confirmation status of `txid`.
    pub async fn fetch_transaction_status(&self, txid: &str) -> UpstreamResult<TransactionStatus> {
        let mut status = TransactionStatus::unknown(txid, self.network);

        match self.flavor {
            ApiFlavor::Esplora => {
                let tx: EsploraTx = self.get_json(&["tx", txid]).await?;
                if tx.status.confirmed {
                    let height = tx.status.block_height.ok_or_else(|| {
                        UpstreamError::Decode("confirmed transaction without block height".into())
                    })?;
                    let tip = self.tip_height(self.timeout).await?;
                    status.confirmations = tip.saturating_sub(height).saturating_add(1) as u32;
                    status.block_height = Some(height);
                    status.block_hash = tx.status.block_hash;
                    status.timestamp = tx.status.block_time.map(|t| t.to_string());
                }
            }
            ApiFlavor::Canonical => {
                let tx: CanonicalTx = self.get_json(&["transaction", txid]).await?;
                status.confirmations = tx.confirmations;
                status.block_height = tx.block_height;
                status.block_hash = tx.block_hash;
                status.timestamp = tx.timestamp;
            }
        }

        status.status = TxState::from_confirmations(status.confirmations);
        Ok(status)
    }

    /// Current chain tip height, bounded by the probe deadline.
    pub async fn probe(&self) -> UpstreamResult<u64> {
        self.tip_height(self.probe_timeout).await
    }

    async fn tip_height(&self, deadline: Duration) -> UpstreamResult<u64> {
        let url = self.endpoint_url(&["blocks", "tip", "height"])?;
        let http = &self.http;
        with_deadline(deadline, async {
            let response = http
                .get(url.clone())
                .timeout(deadline)
                .send()
                .await
                .map_err(|e| UpstreamError::Http(e.to_string()))?;
            let body = check_status(response, url.as_str())?
                .text()
                .await
                .map_err(|e| UpstreamError::Http(e.to_string()))?;
            body.trim()
                .parse::<u64>()
                .map_err(|e| UpstreamError::Decode(format!("tip height '{}': {}", body.trim(), e)))
        })
        .await
    }

    /// Base URL extended with `segments`, each percent-encoded as one path
    /// segment.
    fn endpoint_url(&self, segments: &[&str]) -> UpstreamResult<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| UpstreamError::Http(format!("invalid base URL '{}': {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| UpstreamError::Http(format!("base URL '{}' cannot take a path", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> UpstreamResult<T> {
        let url = self.endpoint_url(segments)?;
        tracing::debug!(url = %url, network = %self.network, "Querying chain source");

        with_deadline(self.timeout, async {
            let response = self
                .http
                .get(url.clone())
                .send()
                .await
                .map_err(|e| UpstreamError::Http(e.to_string()))?;
            check_status(response, url.as_str())?
                .json::<T>()
                .await
                .map_err(|e| UpstreamError::Decode(e.to_string()))
        })
        .await
    }
}

fn check_status(response: reqwest::Response, url: &str) -> UpstreamResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(UpstreamError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        })
    }
}

#[derive(Debug, Default, Deserialize)]
struct EsploraStats {
    #[serde(default)]
    funded_txo_sum: i64,
    #[serde(default)]
    spent_txo_sum: i64,
}

impl EsploraStats {
    fn net(&self) -> i64 {
        self.funded_txo_sum - self.spent_txo_sum
    }
}

#[derive(Debug, Deserialize)]
struct EsploraAddress {
    #[serde(default)]
    chain_stats: EsploraStats,
    #[serde(default)]
    mempool_stats: EsploraStats,
}

#[derive(Debug, Default, Deserialize)]
struct EsploraStatus {
    #[serde(default)]
    confirmed: bool,
    #[serde(default)]
    confirmations: Option<u32>,
    #[serde(default)]
    block_height: Option<u64>,
    #[serde(default)]
    block_hash: Option<String>,
    #[serde(default)]
    block_time: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EsploraUtxo {
    txid: String,
    vout: u32,
    value: u64,
    #[serde(default)]
    scriptpubkey: String,
    #[serde(default)]
    status: EsploraStatus,
}

impl EsploraUtxo {
    fn into_utxo(self) -> Utxo {
        let confirmations = self
            .status
            .confirmations
            .unwrap_or(if self.status.confirmed { 1 } else { 0 });
        Utxo {
            txid: self.txid,
            vout: self.vout,
            value: self.value,
            script: self.scriptpubkey,
            confirmations,
            address: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct EsploraTx {
    #[serde(default)]
    status: EsploraStatus,
}

#[derive(Debug, Deserialize)]
struct CanonicalTx {
    #[serde(default)]
    confirmations: u32,
    #[serde(default)]
    block_height: Option<u64>,
    #[serde(default)]
    block_hash: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}
