//! Key import, address rendering and transaction signing.
//!
//! [`KeyProvider`] and [`SigningProvider`] are the seam between the engine and
//! the cryptographic primitives. [`Secp256k1Provider`] implements both on top
//! of rust-bitcoin and libsecp256k1.

use bitcoin::bip32::Xpriv;
use bitcoin::hashes::Hash;
use bitcoin::key::{Keypair, TapTweak};
use bitcoin::script::{Builder, PushBytesBuf};
use bitcoin::secp256k1::{All, Message, Secp256k1};
use bitcoin::sighash::{EcdsaSighashType, Prevouts, SighashCache, TapSighashType};
use bitcoin::{
    ecdsa, taproot, Address, Amount, CompressedPublicKey, NetworkKind, PrivateKey, PublicKey,
    ScriptBuf, Transaction, TxOut, Witness,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::chain::types::Network;

/// Address script formats, from newest to oldest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptFormat {
    /// Legacy pay-to-pubkey-hash.
    P2pkh,
    /// P2WPKH nested in P2SH.
    P2sh,
    /// Native segwit v0.
    #[default]
    P2wpkh,
    /// Taproot key-path (no script tree).
    P2tr,
}

impl ScriptFormat {
    /// The next format to try when this one cannot be rendered.
    pub fn fallback(self) -> Option<ScriptFormat> {
        match self {
            ScriptFormat::P2tr => Some(ScriptFormat::P2wpkh),
            ScriptFormat::P2wpkh => Some(ScriptFormat::P2sh),
            ScriptFormat::P2sh => Some(ScriptFormat::P2pkh),
            ScriptFormat::P2pkh => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptFormat::P2pkh => "p2pkh",
            ScriptFormat::P2sh => "p2sh",
            ScriptFormat::P2wpkh => "p2wpkh",
            ScriptFormat::P2tr => "p2tr",
        }
    }
}

impl fmt::Display for ScriptFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScriptFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p2pkh" | "legacy" => Ok(ScriptFormat::P2pkh),
            "p2sh" | "p2sh-p2wpkh" => Ok(ScriptFormat::P2sh),
            "p2wpkh" | "segwit" | "bech32" => Ok(ScriptFormat::P2wpkh),
            "p2tr" | "taproot" => Ok(ScriptFormat::P2tr),
            other => Err(format!("unknown address format '{}'", other)),
        }
    }
}

/// Ways a caller-supplied string can be turned into a private key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportMethod {
    /// WIF, or 64 hex characters of raw key bytes.
    PrivateKey,
    /// BIP32 extended private key (xprv/tprv).
    ExtendedKey,
    /// Hex seed imported as an HD master key.
    Seed,
}

impl ImportMethod {
    /// Attempt order used when loading a key.
    pub const ORDER: [ImportMethod; 3] =
        [ImportMethod::PrivateKey, ImportMethod::ExtendedKey, ImportMethod::Seed];

    pub fn as_str(&self) -> &'static str {
        match self {
            ImportMethod::PrivateKey => "private_key",
            ImportMethod::ExtendedKey => "extended_key",
            ImportMethod::Seed => "seed",
        }
    }
}

/// Errors raised by a key or signing provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Invalid key: {0}")]
    KeyInvalid(String),

    #[error("Format {format} unsupported: {reason}")]
    FormatUnsupported { format: ScriptFormat, reason: String },

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Key loading and address rendering.
pub trait KeyProvider: Send + Sync {
    /// Load `raw` with a single import method.
    fn import(&self, raw: &str, method: ImportMethod, network: Network) -> Result<PrivateKey, ProviderError>;

    /// Render the address of `key` in `format`.
    fn render(&self, key: &PrivateKey, format: ScriptFormat, network: Network) -> Result<String, ProviderError>;
}

/// In-place transaction signing.
pub trait SigningProvider: Send + Sync {
    /// Sign every input `key` can spend; returns the number signed.
    ///
    /// `prevouts[i]` is the output spent by input `i`, when known.
    fn sign(&self, tx: &mut Transaction, key: &PrivateKey, prevouts: &[Option<TxOut>]) -> Result<usize, ProviderError>;
}

/// Default provider backed by libsecp256k1.
#[derive(Clone)]
pub struct Secp256k1Provider {
    secp: Secp256k1<All>,
}

impl Default for Secp256k1Provider {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Secp256k1Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secp256k1Provider")
    }
}

impl Secp256k1Provider {
    pub fn new() -> Self {
        Self { secp: Secp256k1::new() }
    }

    pub fn secp(&self) -> &Secp256k1<All> {
        &self.secp
    }

    fn compressed(&self, key: &PrivateKey, format: ScriptFormat) -> Result<CompressedPublicKey, ProviderError> {
        CompressedPublicKey::from_private_key(&self.secp, key).map_err(|_| ProviderError::FormatUnsupported {
            format,
            reason: "uncompressed keys cannot be used in segwit outputs".to_string(),
        })
    }

    /// Locking scripts this key can spend, by script format.
    fn owned_scripts(&self, key: &PrivateKey) -> OwnedScripts {
        let public = PublicKey::from_private_key(&self.secp, key);
        let p2pkh = ScriptBuf::new_p2pkh(&public.pubkey_hash());

        let segwit = CompressedPublicKey::from_private_key(&self.secp, key).ok().map(|compressed| {
            let p2wpkh = ScriptBuf::new_p2wpkh(&compressed.wpubkey_hash());
            let p2sh = ScriptBuf::new_p2sh(&p2wpkh.script_hash());
            let xonly = compressed.0.x_only_public_key().0;
            let p2tr = ScriptBuf::new_p2tr(&self.secp, xonly, None);
            SegwitScripts { p2wpkh, p2sh, p2tr }
        });

        OwnedScripts { public, p2pkh, segwit }
    }
}

struct SegwitScripts {
    p2wpkh: ScriptBuf,
    p2sh: ScriptBuf,
    p2tr: ScriptBuf,
}

struct OwnedScripts {
    public: PublicKey,
    p2pkh: ScriptBuf,
    segwit: Option<SegwitScripts>,
}

impl OwnedScripts {
    /// How input spending `script` should be signed, if at all.
    fn classify(&self, script: &ScriptBuf) -> Option<ScriptFormat> {
        if *script == self.p2pkh {
            return Some(ScriptFormat::P2pkh);
        }
        let segwit = self.segwit.as_ref()?;
        if *script == segwit.p2wpkh {
            Some(ScriptFormat::P2wpkh)
        } else if *script == segwit.p2sh {
            Some(ScriptFormat::P2sh)
        } else if *script == segwit.p2tr {
            Some(ScriptFormat::P2tr)
        } else {
            None
        }
    }
}

fn network_kind(network: Network) -> NetworkKind {
    NetworkKind::from(network.to_bitcoin())
}

fn push_bytes(bytes: Vec<u8>) -> Result<PushBytesBuf, ProviderError> {
    PushBytesBuf::try_from(bytes).map_err(|e| ProviderError::Signing(e.to_string()))
}

impl KeyProvider for Secp256k1Provider {
    fn import(&self, raw: &str, method: ImportMethod, network: Network) -> Result<PrivateKey, ProviderError> {
        let raw = raw.trim();
        let expected = network_kind(network);

        match method {
            ImportMethod::PrivateKey => {
                if raw.len() == 64 && raw.bytes().all(|b| b.is_ascii_hexdigit()) {
                    let bytes = hex::decode(raw).map_err(|e| ProviderError::KeyInvalid(e.to_string()))?;
                    return PrivateKey::from_slice(&bytes, expected)
                        .map_err(|e| ProviderError::KeyInvalid(e.to_string()));
                }
                let key = PrivateKey::from_wif(raw).map_err(|e| ProviderError::KeyInvalid(e.to_string()))?;
                if key.network != expected {
                    return Err(ProviderError::KeyInvalid(format!("WIF key is not for {}", network)));
                }
                Ok(key)
            }
            ImportMethod::ExtendedKey => {
                let xpriv = Xpriv::from_str(raw).map_err(|e| ProviderError::KeyInvalid(e.to_string()))?;
                if xpriv.network != expected {
                    return Err(ProviderError::KeyInvalid(format!("extended key is not for {}", network)));
                }
                Ok(xpriv.to_priv())
            }
            ImportMethod::Seed => {
                let seed = hex::decode(raw).map_err(|e| ProviderError::KeyInvalid(e.to_string()))?;
                if !(16..=64).contains(&seed.len()) {
                    return Err(ProviderError::KeyInvalid(format!(
                        "seed must be 16 to 64 bytes, got {}",
                        seed.len()
                    )));
                }
                let master = Xpriv::new_master(network.to_bitcoin(), &seed)
                    .map_err(|e| ProviderError::KeyInvalid(e.to_string()))?;
                Ok(master.to_priv())
            }
        }
    }

    fn render(&self, key: &PrivateKey, format: ScriptFormat, network: Network) -> Result<String, ProviderError> {
        let btc_network = network.to_bitcoin();

        let address = match format {
            ScriptFormat::P2pkh => Address::p2pkh(PublicKey::from_private_key(&self.secp, key), btc_network),
            ScriptFormat::P2sh => Address::p2shwpkh(&self.compressed(key, format)?, btc_network),
            ScriptFormat::P2wpkh => Address::p2wpkh(&self.compressed(key, format)?, btc_network),
            ScriptFormat::P2tr => {
                let xonly = self.compressed(key, format)?.0.x_only_public_key().0;
                Address::p2tr(&self.secp, xonly, None, btc_network)
            }
        };
        Ok(address.to_string())
    }
}

enum Witnessed {
    ScriptSig(ScriptBuf),
    Witness(Witness),
    Both(ScriptBuf, Witness),
}

impl SigningProvider for Secp256k1Provider {
    fn sign(&self, tx: &mut Transaction, key: &PrivateKey, prevouts: &[Option<TxOut>]) -> Result<usize, ProviderError> {
        let owned = self.owned_scripts(key);
        let secret = key.inner;

        // Sighashes never commit to other inputs' unlocking data, so compute
        // them all against a snapshot before touching the transaction.
        let snapshot = tx.clone();
        let mut cache = SighashCache::new(&snapshot);
        let all_prevouts: Option<Vec<TxOut>> = (0..snapshot.input.len())
            .map(|i| prevouts.get(i).cloned().flatten())
            .collect();

        let mut updates = Vec::new();
        for index in 0..snapshot.input.len() {
            let format = match prevouts.get(index).and_then(|p| p.as_ref()) {
                Some(prevout) => match owned.classify(&prevout.script_pubkey) {
                    Some(format) => format,
                    None => {
                        tracing::debug!(input = index, "Input not spendable by this key, skipping");
                        continue;
                    }
                },
                None => ScriptFormat::P2pkh,
            };
            let value = prevouts
                .get(index)
                .and_then(|p| p.as_ref())
                .map(|p| p.value)
                .unwrap_or(Amount::ZERO);

            let update = match format {
                ScriptFormat::P2pkh => {
                    let sighash = cache
                        .legacy_signature_hash(index, &owned.p2pkh, EcdsaSighashType::All.to_u32())
                        .map_err(|e| ProviderError::Signing(e.to_string()))?;
                    let msg = Message::from_digest(sighash.to_byte_array());
                    let signature = ecdsa::Signature {
                        signature: self.secp.sign_ecdsa(&msg, &secret),
                        sighash_type: EcdsaSighashType::All,
                    };
                    let script_sig = Builder::new()
                        .push_slice(push_bytes(signature.to_vec())?)
                        .push_key(&owned.public)
                        .into_script();
                    Witnessed::ScriptSig(script_sig)
                }
                ScriptFormat::P2wpkh | ScriptFormat::P2sh => {
                    let segwit = owned.segwit.as_ref().ok_or_else(|| {
                        ProviderError::Signing("segwit input requires a compressed key".to_string())
                    })?;
                    let sighash = cache
                        .p2wpkh_signature_hash(index, &segwit.p2wpkh, value, EcdsaSighashType::All)
                        .map_err(|e| ProviderError::Signing(e.to_string()))?;
                    let msg = Message::from_digest(sighash.to_byte_array());
                    let signature = ecdsa::Signature {
                        signature: self.secp.sign_ecdsa(&msg, &secret),
                        sighash_type: EcdsaSighashType::All,
                    };
                    let witness = Witness::p2wpkh(&signature, &owned.public.inner);
                    if format == ScriptFormat::P2sh {
                        let script_sig = Builder::new()
                            .push_slice(push_bytes(segwit.p2wpkh.to_bytes())?)
                            .into_script();
                        Witnessed::Both(script_sig, witness)
                    } else {
                        Witnessed::Witness(witness)
                    }
                }
                ScriptFormat::P2tr => {
                    let outputs = all_prevouts.as_ref().ok_or_else(|| {
                        ProviderError::Signing("taproot signing needs every spent output".to_string())
                    })?;
                    let sighash = cache
                        .taproot_key_spend_signature_hash(index, &Prevouts::All(outputs.as_slice()), TapSighashType::Default)
                        .map_err(|e| ProviderError::Signing(e.to_string()))?;
                    let msg = Message::from_digest(sighash.to_byte_array());
                    let keypair = Keypair::from_secret_key(&self.secp, &secret)
                        .tap_tweak(&self.secp, None)
                        .to_inner();
                    let signature = taproot::Signature {
                        signature: self.secp.sign_schnorr_no_aux_rand(&msg, &keypair),
                        sighash_type: TapSighashType::Default,
                    };
                    Witnessed::Witness(Witness::p2tr_key_spend(&signature))
                }
            };
            updates.push((index, update));
        }

        let signed = updates.len();
        for (index, update) in updates {
            let input = &mut tx.input[index];
            match update {
                Witnessed::ScriptSig(script_sig) => input.script_sig = script_sig,
                Witnessed::Witness(witness) => input.witness = witness,
                Witnessed::Both(script_sig, witness) => {
                    input.script_sig = script_sig;
                    input.witness = witness;
                }
            }
        }

        Ok(signed)
    }
}
