//! Transaction signing through a [`SigningProvider`].
//!
//! Whether anything was signed is judged by comparing the serialized
//! transaction before and after the provider runs. Failures never raise:
//! the original hex comes back with `is_signed = false` and the error text.

use bitcoin::{Amount, ScriptBuf, Transaction, TxOut};
use std::sync::Arc;

use crate::chain::types::Network;
use crate::keys::provider::{KeyProvider, SigningProvider};
use crate::keys::resolver::load_key;
use crate::observability::metrics;
use crate::tx::types::{decode_tx, encode_tx, PrevoutSpec, SignResult, NULL_TXID};

/// Signs transactions with caller-supplied keys.
#[derive(Debug)]
pub struct TransactionSigner<P> {
    provider: Arc<P>,
}

impl<P> Clone for TransactionSigner<P> {
    fn clone(&self) -> Self {
        Self { provider: Arc::clone(&self.provider) }
    }
}

impl<P: KeyProvider + SigningProvider> TransactionSigner<P> {
    pub fn new(provider: Arc<P>) -> Self {
        Self { provider }
    }

    /// Sign `tx_hex` with `private_key`, treating every input as legacy.
    pub fn sign(&self, tx_hex: &str, private_key: &str, network: Network) -> SignResult {
        self.sign_with_prevouts(tx_hex, private_key, network, &[])
    }

    /// Sign `tx_hex`, using `prevouts[i]` to pick the script type of input `i`.
    pub fn sign_with_prevouts(
        &self,
        tx_hex: &str,
        private_key: &str,
        network: Network,
        prevouts: &[Option<PrevoutSpec>],
    ) -> SignResult {
        let mut tx = match decode_tx(tx_hex) {
            Ok(tx) => tx,
            Err(e) => return failed(tx_hex, None, e),
        };

        let spent = match to_txouts(prevouts) {
            Ok(spent) => spent,
            Err(e) => return failed(tx_hex, Some(&tx), e),
        };

        let key = match load_key(self.provider.as_ref(), private_key, network) {
            Ok(key) => key,
            Err(e) => return failed(tx_hex, Some(&tx), e.to_string()),
        };

        let before = encode_tx(&tx);
        let touched = match self.provider.sign(&mut tx, &key, &spent) {
            Ok(touched) => touched,
            Err(e) => return failed(tx_hex, Some(&tx), e.to_string()),
        };
        let after = encode_tx(&tx);
        let is_signed = before != after;

        let txid = tx.compute_txid().to_string();
        tracing::info!(
            txid = %txid,
            network = %network,
            inputs = tx.input.len(),
            touched,
            is_signed,
            "Transaction signed"
        );

        SignResult {
            tx_hex: after,
            txid,
            is_signed,
            signature_count: if is_signed { tx.input.len() } else { 0 },
            input_count: tx.input.len(),
            output_count: tx.output.len(),
            size: tx.total_size(),
            vsize: tx.vsize(),
            warning: (!is_signed).then(|| "no input could be signed with the supplied key".to_string()),
            error: None,
        }
    }
}

fn to_txouts(prevouts: &[Option<PrevoutSpec>]) -> Result<Vec<Option<TxOut>>, String> {
    prevouts
        .iter()
        .map(|prevout| {
            prevout
                .as_ref()
                .map(|spec| {
                    let script = hex::decode(&spec.script)
                        .map_err(|e| format!("invalid prevout script '{}': {}", spec.script, e))?;
                    Ok(TxOut {
                        value: Amount::from_sat(spec.value),
                        script_pubkey: ScriptBuf::from_bytes(script),
                    })
                })
                .transpose()
        })
        .collect()
}

fn failed(tx_hex: &str, tx: Option<&Transaction>, error: String) -> SignResult {
    metrics::record_fallback("signer");
    tracing::warn!(error = %error, "Signing failed, returning original transaction");

    SignResult {
        tx_hex: tx_hex.to_string(),
        txid: tx
            .map(|tx| tx.compute_txid().to_string())
            .unwrap_or_else(|| NULL_TXID.to_string()),
        is_signed: false,
        signature_count: 0,
        input_count: tx.map(|tx| tx.input.len()).unwrap_or(0),
        output_count: tx.map(|tx| tx.output.len()).unwrap_or(0),
        size: tx.map(|tx| tx.total_size()).unwrap_or(0),
        vsize: tx.map(|tx| tx.vsize()).unwrap_or(0),
        warning: Some("transaction was not signed".to_string()),
        error: Some(error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::provider::Secp256k1Provider;
    use crate::tx::builder::TransactionBuilder;
    use crate::tx::types::{TxInputSpec, TxOutputSpec};

    const KEY_ONE: &str = "0000000000000000000000000000000000000000000000000000000000000001";
    const TB1: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
    const P2WPKH_SCRIPT: &str = "0014751e76e8199196d454941c45d1b3a323f1433bd6";

    fn unsigned() -> String {
        TransactionBuilder::new()
            .build(
                &[TxInputSpec {
                    txid: "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b".to_string(),
                    vout: 0,
                    value: Some(10_000),
                    sequence: None,
                    address: None,
                }],
                &[TxOutputSpec { address: TB1.to_string(), value: 9_000 }],
                None,
                Network::Test,
            )
            .unwrap()
            .raw_transaction
    }

    fn signer() -> TransactionSigner<Secp256k1Provider> {
        TransactionSigner::new(Arc::new(Secp256k1Provider::new()))
    }

    #[test]
    fn test_sign_legacy() {
        let tx_hex = unsigned();
        let result = signer().sign(&tx_hex, KEY_ONE, Network::Test);

        assert!(result.is_signed);
        assert_eq!(result.signature_count, 1);
        assert_ne!(result.tx_hex, tx_hex);
        assert!(result.error.is_none());
        let tx = decode_tx(&result.tx_hex).unwrap();
        assert!(!tx.input[0].script_sig.is_empty());
    }

    #[test]
    fn test_sign_segwit_prevout() {
        let tx_hex = unsigned();
        let prevouts = vec![Some(PrevoutSpec { value: 10_000, script: P2WPKH_SCRIPT.to_string() })];
        let result = signer().sign_with_prevouts(&tx_hex, KEY_ONE, Network::Test, &prevouts);

        assert!(result.is_signed);
        let tx = decode_tx(&result.tx_hex).unwrap();
        assert!(tx.input[0].script_sig.is_empty());
        assert_eq!(tx.input[0].witness.len(), 2);
        assert!(result.vsize < result.size);
    }

    #[test]
    fn test_foreign_prevout_is_not_signed() {
        let tx_hex = unsigned();
        let prevouts = vec![Some(PrevoutSpec { value: 10_000, script: "6a0101".to_string() })];
        let result = signer().sign_with_prevouts(&tx_hex, KEY_ONE, Network::Test, &prevouts);

        assert!(!result.is_signed);
        assert_eq!(result.signature_count, 0);
        assert_eq!(result.tx_hex, tx_hex);
        assert!(result.warning.is_some());
    }

    #[test]
    fn test_unparseable_transaction() {
        let result = signer().sign("deadbeef", KEY_ONE, Network::Test);
        assert!(!result.is_signed);
        assert_eq!(result.tx_hex, "deadbeef");
        assert_eq!(result.txid, NULL_TXID);
        assert!(result.error.is_some());
    }

    #[test]
    fn test_bad_key_keeps_original() {
        let tx_hex = unsigned();
        let result = signer().sign(&tx_hex, "garbage", Network::Test);
        assert!(!result.is_signed);
        assert_eq!(result.tx_hex, tx_hex);
        assert_eq!(result.input_count, 1);
        assert_ne!(result.txid, NULL_TXID);
    }
}
