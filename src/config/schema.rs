//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet
//! engine. All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::chain::types::Network;

/// File name of the persisted chain-data cache inside `cache.dir`.
pub const CACHE_FILE_NAME: &str = "blockchain_cache.json";

/// Root configuration for the wallet engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// Network used when a caller does not name one.
    pub network: Network,

    /// Skip every outbound query and serve cached data only.
    pub offline_mode: bool,

    /// Persistent chain-data cache settings.
    pub cache: CacheConfig,

    /// Balance/UTXO/status data sources.
    pub upstream: UpstreamConfig,

    /// Fee-rate sources and the in-memory fee cache.
    pub fees: FeeConfig,

    /// Transaction validation policy.
    pub validation: ValidationConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl WalletConfig {
    /// TTL the cache should enforce for this configuration.
    ///
    /// Offline (cold wallet) operation uses the long cold TTL.
    pub fn active_cache_ttl(&self) -> Duration {
        if self.offline_mode {
            Duration::from_secs(self.cache.cold_ttl_secs)
        } else {
            Duration::from_secs(self.cache.ttl_secs)
        }
    }
}

/// Persistent cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Directory holding the cache file. Defaults to `~/.bitcoin-wallet/cache`.
    pub dir: Option<PathBuf>,

    /// Freshness window in online mode, in seconds.
    pub ttl_secs: u64,

    /// Freshness window in offline (cold wallet) mode, in seconds.
    pub cold_ttl_secs: u64,
}

impl CacheConfig {
    /// Resolve the cache directory, falling back to the home directory default.
    pub fn resolved_dir(&self) -> PathBuf {
        match &self.dir {
            Some(dir) => dir.clone(),
            None => dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".bitcoin-wallet")
                .join("cache"),
        }
    }

    /// Full path of the persisted cache file.
    pub fn file_path(&self) -> PathBuf {
        self.resolved_dir().join(CACHE_FILE_NAME)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            ttl_secs: 300,
            cold_ttl_secs: 30 * 24 * 60 * 60,
        }
    }
}

/// Response shape spoken by a data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiFlavor {
    /// Esplora REST (`/address/{a}` with `chain_stats`, `/address/{a}/utxo`).
    Esplora,
    /// Pre-normalized `{confirmed, unconfirmed}` balance and UTXO list.
    Canonical,
}

/// A single network's data source.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Base URL, without a trailing slash.
    pub base_url: String,

    /// Shape of the responses served at `base_url`.
    pub flavor: ApiFlavor,
}

/// Upstream data-source configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Source for `mainnet`.
    pub mainnet: EndpointConfig,

    /// Source for `testnet`.
    pub testnet: EndpointConfig,

    /// Deadline for each outbound request, in seconds.
    pub request_timeout_secs: u64,

    /// Deadline for the connectivity probe, in seconds.
    pub probe_timeout_secs: u64,

    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl UpstreamConfig {
    /// Endpoint serving the given network.
    pub fn endpoint(&self, network: Network) -> &EndpointConfig {
        match network {
            Network::Main => &self.mainnet,
            Network::Test => &self.testnet,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            mainnet: EndpointConfig {
                base_url: "https://api.blockchair.com/bitcoin".to_string(),
                flavor: ApiFlavor::Canonical,
            },
            testnet: EndpointConfig {
                base_url: "https://blockstream.info/testnet/api".to_string(),
                flavor: ApiFlavor::Esplora,
            },
            request_timeout_secs: 10,
            probe_timeout_secs: 2,
            use_system_proxy: true,
        }
    }
}

/// Fee estimation configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeeConfig {
    /// Recommended-fees endpoint for `mainnet`.
    pub mainnet_url: String,

    /// Recommended-fees endpoint for `testnet`.
    pub testnet_url: String,

    /// Lifetime of a fetched estimate, in seconds.
    pub cache_secs: u64,

    /// Deadline for the fee request, in seconds.
    pub request_timeout_secs: u64,
}

impl FeeConfig {
    /// Endpoint serving the given network.
    pub fn url(&self, network: Network) -> &str {
        match network {
            Network::Main => &self.mainnet_url,
            Network::Test => &self.testnet_url,
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            mainnet_url: "https://mempool.space/api/v1/fees/recommended".to_string(),
            testnet_url: "https://mempool.space/testnet/api/v1/fees/recommended".to_string(),
            cache_secs: 300,
            request_timeout_secs: 10,
        }
    }
}

/// Transaction validation policy.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Substitute `outputs + 1000` sats when no input value can be resolved.
    ///
    /// Keeps validation usable without UTXO access, at the cost of the funds
    /// check. Off unless explicitly enabled.
    pub synthetic_input_leniency: bool,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WalletConfig::default();
        assert_eq!(config.network, Network::Test);
        assert!(!config.offline_mode);
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.cache.cold_ttl_secs, 2_592_000);
        assert_eq!(config.upstream.testnet.flavor, ApiFlavor::Esplora);
        assert!(!config.validation.synthetic_input_leniency);
    }

    #[test]
    fn test_active_ttl_follows_offline_mode() {
        let mut config = WalletConfig::default();
        assert_eq!(config.active_cache_ttl(), Duration::from_secs(300));

        config.offline_mode = true;
        assert_eq!(config.active_cache_ttl(), Duration::from_secs(2_592_000));
    }

    #[test]
    fn test_partial_toml() {
        let config: WalletConfig = toml::from_str(
            r#"
            network = "mainnet"
            offline_mode = true

            [cache]
            dir = "/tmp/wallet-cache"
            "#,
        )
        .unwrap();

        assert_eq!(config.network, Network::Main);
        assert_eq!(config.cache.file_path(), PathBuf::from("/tmp/wallet-cache").join(CACHE_FILE_NAME));
        assert_eq!(config.cache.ttl_secs, 300);
        assert_eq!(config.fees.cache_secs, 300);
    }
}
