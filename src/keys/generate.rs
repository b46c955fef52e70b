//! Fresh key material: raw entropy, BIP39 mnemonics and BIP32 paths.

use bip39::Mnemonic;
use bitcoin::bip32::{DerivationPath, Xpriv};
use bitcoin::secp256k1::{All, Secp256k1};
use bitcoin::{PrivateKey, PublicKey};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::chain::types::Network;
use crate::error::{WalletError, WalletResult};
use crate::keys::provider::{KeyProvider, ScriptFormat};
use crate::keys::resolver::AddressResolver;
use crate::observability::logging::mask_secret;

/// Path used for BIP39 keys when no explicit path is requested.
pub const BIP39_PATH: &str = "m/0";

/// How new key material is produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMethod {
    /// A random secp256k1 key.
    Entropy,
    /// A 12-word mnemonic, key at `m/0`.
    #[default]
    Bip39,
    /// A 12-word mnemonic, key at a caller-chosen path.
    Bip32,
}

impl FromStr for GenerationMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "entropy" => Ok(GenerationMethod::Entropy),
            "bip39" => Ok(GenerationMethod::Bip39),
            "bip32" => Ok(GenerationMethod::Bip32),
            other => Err(format!("unknown generation method '{}'", other)),
        }
    }
}

/// Parameters of a key generation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyRequest {
    pub method: GenerationMethod,
    pub network: Network,
    /// Existing mnemonic to restore instead of generating one.
    pub mnemonic: Option<String>,
    pub passphrase: Option<String>,
    /// BIP32 path; only used by [`GenerationMethod::Bip32`].
    pub derivation_path: Option<String>,
    pub format: ScriptFormat,
}

/// Generated key material. Never persisted.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    /// WIF-encoded private key.
    pub private_key: String,
    /// Compressed public key, hex.
    pub public_key: String,
    pub address: String,
    pub format: ScriptFormat,
    pub network: Network,
    pub mnemonic: Option<String>,
    pub derivation_path: Option<String>,
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("private_key", &mask_secret(&self.private_key))
            .field("public_key", &self.public_key)
            .field("address", &self.address)
            .field("format", &self.format)
            .field("network", &self.network)
            .field("mnemonic", &self.mnemonic.as_deref().map(mask_secret))
            .field("derivation_path", &self.derivation_path)
            .finish()
    }
}

/// Default BIP32 path for a network (BIP44 account 0, first receive key).
pub fn default_bip32_path(network: Network) -> &'static str {
    match network {
        Network::Main => "m/44'/0'/0'/0/0",
        Network::Test => "m/44'/1'/0'/0/0",
    }
}

/// Produces new keys and renders their addresses through a resolver.
#[derive(Debug)]
pub struct KeyGenerator<P> {
    resolver: AddressResolver<P>,
    secp: Secp256k1<All>,
}

impl<P: KeyProvider> KeyGenerator<P> {
    pub fn new(resolver: AddressResolver<P>) -> Self {
        Self {
            resolver,
            secp: Secp256k1::new(),
        }
    }

    /// Generate (or restore) key material as described by `request`.
    pub fn generate(&self, request: &KeyRequest) -> WalletResult<KeyMaterial> {
        let network = request.network;

        let (key, mnemonic, path) = match request.method {
            GenerationMethod::Entropy => (random_key(network)?, None, None),
            GenerationMethod::Bip39 | GenerationMethod::Bip32 => {
                let mnemonic = match &request.mnemonic {
                    Some(phrase) => Mnemonic::parse_normalized(phrase)
                        .map_err(|e| WalletError::InvalidKeyMaterial(format!("invalid mnemonic: {}", e)))?,
                    None => random_mnemonic()?,
                };
                let path = match request.method {
                    GenerationMethod::Bip32 => request
                        .derivation_path
                        .clone()
                        .unwrap_or_else(|| default_bip32_path(network).to_string()),
                    _ => BIP39_PATH.to_string(),
                };
                let seed = mnemonic.to_seed(request.passphrase.as_deref().unwrap_or(""));
                let key = self.derive(&seed, &path, network)?;
                (key, Some(mnemonic.to_string()), Some(path))
            }
        };

        let derived = self.resolver.render(&key, request.format, network)?;
        let public = PublicKey::from_private_key(&self.secp, &key);

        tracing::info!(
            method = ?request.method,
            network = %network,
            format = %derived.format,
            address = %derived.address,
            "Generated key material"
        );

        Ok(KeyMaterial {
            private_key: key.to_wif(),
            public_key: public.to_string(),
            address: derived.address,
            format: derived.format,
            network,
            mnemonic,
            derivation_path: path,
        })
    }

    fn derive(&self, seed: &[u8], path: &str, network: Network) -> WalletResult<PrivateKey> {
        let path = DerivationPath::from_str(path)
            .map_err(|e| WalletError::InvalidRequest(format!("invalid derivation path '{}': {}", path, e)))?;
        let master = Xpriv::new_master(network.to_bitcoin(), seed)
            .map_err(|e| WalletError::InvalidKeyMaterial(e.to_string()))?;
        let child = master
            .derive_priv(&self.secp, &path)
            .map_err(|e| WalletError::InvalidRequest(e.to_string()))?;
        Ok(child.to_priv())
    }
}

fn random_key(network: Network) -> WalletResult<PrivateKey> {
    let mut rng = rand::thread_rng();
    let mut bytes = [0u8; 32];
    // Redraw on out-of-range scalars.
    for _ in 0..16 {
        rng.fill_bytes(&mut bytes);
        if let Ok(key) = PrivateKey::from_slice(&bytes, network.to_bitcoin()) {
            return Ok(key);
        }
    }
    Err(WalletError::InvalidKeyMaterial("could not draw a valid private key".to_string()))
}

fn random_mnemonic() -> WalletResult<Mnemonic> {
    let mut entropy = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut entropy);
    Mnemonic::from_entropy(&entropy).map_err(|e| WalletError::InvalidKeyMaterial(e.to_string()))
}
