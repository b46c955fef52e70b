//! Address derivation with ordered key import and format fallback.

use bitcoin::PrivateKey;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::chain::types::Network;
use crate::error::{WalletError, WalletResult};
use crate::keys::provider::{ImportMethod, KeyProvider, ScriptFormat};
use crate::observability::logging::mask_secret;
use crate::observability::metrics;

/// An address derived from caller key material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedAddress {
    pub address: String,
    /// Format the caller asked for.
    pub requested_format: ScriptFormat,
    /// Format actually rendered.
    pub format: ScriptFormat,
    pub network: Network,
    /// True when `format` differs from `requested_format`.
    pub fell_back: bool,
}

/// Load `raw` by trying each [`ImportMethod`] in order.
///
/// The first method that succeeds wins.
pub fn load_key<P: KeyProvider + ?Sized>(provider: &P, raw: &str, network: Network) -> WalletResult<PrivateKey> {
    let mut failures = Vec::with_capacity(ImportMethod::ORDER.len());

    for method in ImportMethod::ORDER {
        match provider.import(raw, method, network) {
            Ok(key) => {
                tracing::debug!(method = method.as_str(), key = %mask_secret(raw), "Key loaded");
                return Ok(key);
            }
            Err(e) => failures.push(format!("{}: {}", method.as_str(), e)),
        }
    }

    tracing::warn!(key = %mask_secret(raw), network = %network, "Key material not recognized");
    Err(WalletError::InvalidKeyMaterial(format!(
        "could not load key as any supported form ({})",
        failures.join("; ")
    )))
}

/// Derives addresses through a [`KeyProvider`].
#[derive(Debug)]
pub struct AddressResolver<P> {
    provider: Arc<P>,
}

impl<P> Clone for AddressResolver<P> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider) }
    }
}

impl<P: KeyProvider> AddressResolver<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Derive the address of `key` in `format`, stepping down the fallback
    /// chain when a format cannot be rendered.
    pub fn derive_address(&self, key: &str, format: ScriptFormat, network: Network) -> WalletResult<DerivedAddress> {
        let private = load_key(self.provider.as_ref(), key, network)?;
        self.render(&private, format, network)
    }

    /// Render an already-loaded key, with fallback.
    pub fn render(&self, key: &PrivateKey, requested: ScriptFormat, network: Network) -> WalletResult<DerivedAddress> {
        let mut current = Some(requested);

        while let Some(format) = current {
            match self.provider.render(key, format, network) {
                Ok(address) => {
                    if format != requested {
                        metrics::record_fallback("address_format");
                    }
                    return Ok(DerivedAddress {
                        address,
                        requested_format: requested,
                        format,
                        network,
                        fell_back: format != requested,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        format = %format,
                        next = ?format.fallback(),
                        error = %e,
                        "Address format unavailable, falling back"
                    );
                    current = format.fallback();
                }
            }
        }

        Err(WalletError::UnsupportedFormat(format!(
            "no address format could be derived starting from {}",
            requested
        )))
    }
}
