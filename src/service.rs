//! Wallet service facade.
//!
//! # Responsibilities
//! - Wire every subsystem from a validated [`WalletConfig`]
//! - Expose the caller-facing operations
//! - Decide the effective offline state per call
//!
//! # Design Decisions
//! - Subsystems initialize in dependency order: cache → gateway → tx
//! - One provider instance backs key import, rendering and signing
//! - Operations that degrade instead of failing return plain values

use std::sync::Arc;

use crate::chain::{
    Balance, BlockchainCache, ChainGateway, FeeEstimate, FeeEstimator, Lookup, Network,
    TransactionStatus, Utxo,
};
use crate::config::validation::validate_config;
use crate::config::{ConfigError, WalletConfig};
use crate::error::WalletResult;
use crate::keys::{
    AddressResolver, DerivedAddress, KeyGenerator, KeyMaterial, KeyRequest, ScriptFormat,
    Secp256k1Provider,
};
use crate::tx::{
    BuildResult, PrevoutSpec, SignResult, TransactionBuilder, TransactionSigner,
    TransactionValidator, TxInputSpec, TxOutputSpec, ValidationReport,
};

/// Entry point for all wallet operations.
#[derive(Debug, Clone)]
pub struct WalletService {
    config: Arc<WalletConfig>,
    resolver: AddressResolver<Secp256k1Provider>,
    generator: Arc<KeyGenerator<Secp256k1Provider>>,
    fees: FeeEstimator,
    gateway: Arc<ChainGateway>,
    builder: TransactionBuilder,
    signer: TransactionSigner<Secp256k1Provider>,
    validator: TransactionValidator<ChainGateway>,
}

impl WalletService {
    /// Validate `config` and build the service, opening the persistent cache.
    pub fn from_config(config: WalletConfig) -> WalletResult<Self> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let cache_path = config.cache.file_path();
        let cache = Arc::new(BlockchainCache::open(&cache_path, config.active_cache_ttl()));
        let gateway = Arc::new(ChainGateway::new(cache, &config.upstream));

        tracing::info!(
            network = %config.network,
            offline = config.offline_mode,
            cache = %cache_path.display(),
            "Wallet service initialized"
        );

        Ok(Self::with_gateway(config, gateway))
    }

    /// Build the service around an existing gateway.
    pub fn with_gateway(config: WalletConfig, gateway: Arc<ChainGateway>) -> Self {
        let provider = Arc::new(Secp256k1Provider::new());
        let resolver = AddressResolver::new(Arc::clone(&provider));

        Self {
            generator: Arc::new(KeyGenerator::new(resolver.clone())),
            resolver,
            fees: FeeEstimator::new(config.fees.clone()),
            validator: TransactionValidator::new(
                Arc::clone(&gateway),
                config.validation.synthetic_input_leniency,
            ),
            signer: TransactionSigner::new(provider),
            builder: TransactionBuilder::new(),
            gateway,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &WalletConfig {
        &self.config
    }

    /// Network used when the caller does not pick one.
    pub fn default_network(&self) -> Network {
        self.config.network
    }

    pub fn gateway(&self) -> &Arc<ChainGateway> {
        &self.gateway
    }

    fn offline(&self, force: bool) -> bool {
        force || self.config.offline_mode
    }

    /// Address of `key` in `format`, with format fallback.
    pub fn derive_address(&self, key: &str, format: ScriptFormat, network: Network) -> WalletResult<DerivedAddress> {
        self.resolver.derive_address(key, format, network)
    }

    /// New or restored key material.
    pub fn generate_key(&self, request: &KeyRequest) -> WalletResult<KeyMaterial> {
        self.generator.generate(request)
    }

    /// Fee rates for `network`.
    pub async fn estimate_fees(&self, network: Network, force_offline: bool) -> FeeEstimate {
        self.fees.estimate(network, self.offline(force_offline)).await
    }

    /// Unsigned transaction from input and output specs.
    pub fn build_transaction(
        &self,
        inputs: &[TxInputSpec],
        outputs: &[TxOutputSpec],
        fee_rate: Option<f64>,
        network: Network,
    ) -> WalletResult<BuildResult> {
        self.builder.build(inputs, outputs, fee_rate, network)
    }

    /// Sign a hex transaction; `prevouts` may be empty.
    pub fn sign_transaction(
        &self,
        tx_hex: &str,
        private_key: &str,
        network: Network,
        prevouts: &[Option<PrevoutSpec>],
    ) -> SignResult {
        self.signer.sign_with_prevouts(tx_hex, private_key, network, prevouts)
    }

    /// Structure and funds check; `hints` may be empty.
    pub async fn validate_transaction(
        &self,
        tx_hex: &str,
        network: Network,
        hints: &[TxInputSpec],
        force_offline: bool,
    ) -> ValidationReport {
        self.validator
            .validate_with_inputs(tx_hex, network, self.offline(force_offline), hints)
            .await
    }

    pub async fn get_balance(&self, address: &str, network: Network, force_offline: bool) -> Lookup<Balance> {
        self.gateway.get_balance(address, network, self.offline(force_offline)).await
    }

    pub async fn get_utxos(&self, address: &str, network: Network, force_offline: bool) -> Lookup<Vec<Utxo>> {
        self.gateway.get_utxos(address, network, self.offline(force_offline)).await
    }

    pub async fn get_transaction_status(
        &self,
        txid: &str,
        network: Network,
        force_offline: bool,
    ) -> WalletResult<TransactionStatus> {
        self.gateway
            .get_transaction_status(txid, network, self.offline(force_offline))
            .await
    }

    /// Configured offline, or the network's data source is unreachable.
    pub async fn is_offline(&self, network: Network) -> bool {
        self.gateway.is_offline(self.config.offline_mode, network).await
    }
}
