//! Transaction validation: structure first, then funds.
//!
//! Funds are checked by resolving every input's value, either from the
//! owning address's UTXO list (via the chain gateway) or from a caller hint.
//! Script execution and consensus rules are out of scope.

use bitcoin::script::Instruction;
use bitcoin::{Address, Amount, CompressedPublicKey, PublicKey, Transaction, TxIn};
use std::sync::Arc;

use crate::chain::gateway::UtxoSource;
use crate::chain::types::Network;
use crate::observability::metrics;
use crate::tx::types::{decode_tx, TxInputSpec, ValidationDetails, ValidationReport};

/// Shortest hex string that could hold a transaction.
pub const MIN_TX_HEX_LEN: usize = 20;

/// Margin added over the output sum when input values are synthesized.
pub const SYNTHETIC_INPUT_MARGIN: u64 = 1000;

/// Validates transactions against chain data.
#[derive(Debug)]
pub struct TransactionValidator<G> {
    gateway: Arc<G>,
    synthetic_input_leniency: bool,
}

impl<G> Clone for TransactionValidator<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            synthetic_input_leniency: self.synthetic_input_leniency,
        }
    }
}

struct Funds {
    sufficient: bool,
    input_sum: u64,
    output_sum: u64,
    synthetic: bool,
    issues: Vec<String>,
}

impl<G: UtxoSource> TransactionValidator<G> {
    pub fn new(gateway: Arc<G>, synthetic_input_leniency: bool) -> Self {
        Self { gateway, synthetic_input_leniency }
    }

    /// Validate `tx_hex` using chain data only.
    pub async fn validate(&self, tx_hex: &str, network: Network, offline: bool) -> ValidationReport {
        self.validate_with_inputs(tx_hex, network, offline, &[]).await
    }

    /// Validate `tx_hex`, with `hints` supplying addresses or values for
    /// inputs matched on txid and vout.
    pub async fn validate_with_inputs(
        &self,
        tx_hex: &str,
        network: Network,
        offline: bool,
        hints: &[TxInputSpec],
    ) -> ValidationReport {
        tracing::info!(network = %network, offline, "Validating transaction");

        let tx = match check_structure(tx_hex) {
            Ok(tx) => tx,
            Err(issue) => {
                tracing::warn!(issue = %issue, "Transaction structure invalid");
                return ValidationReport {
                    is_valid: false,
                    details: ValidationDetails::default(),
                    issues: vec![issue],
                };
            }
        };

        let funds = self.check_funds(&tx, network, offline, hints).await;

        let fee = if funds.sufficient { funds.input_sum - funds.output_sum } else { 0 };
        let vsize = tx.vsize();
        let estimated_fee_rate = if funds.sufficient && fee > 0 && vsize > 0 {
            fee as f64 / vsize as f64
        } else {
            0.0
        };

        let details = ValidationDetails {
            is_valid_structure: true,
            has_sufficient_funds: funds.sufficient,
            version: Some(tx.version.0),
            locktime: Some(tx.lock_time.to_consensus_u32()),
            inputs_count: tx.input.len(),
            outputs_count: tx.output.len(),
            total_input: funds.input_sum,
            total_output: funds.output_sum,
            fee,
            is_signed: tx
                .input
                .iter()
                .any(|input| !input.script_sig.is_empty() || !input.witness.is_empty()),
            txid: Some(tx.compute_txid().to_string()),
            vsize,
            estimated_fee_rate,
            synthetic_input_sum: funds.synthetic,
        };

        tracing::info!(
            txid = ?details.txid,
            sufficient = funds.sufficient,
            issues = funds.issues.len(),
            "Validation finished"
        );

        ValidationReport {
            is_valid: funds.sufficient,
            details,
            issues: funds.issues,
        }
    }

    async fn check_funds(
        &self,
        tx: &Transaction,
        network: Network,
        offline: bool,
        hints: &[TxInputSpec],
    ) -> Funds {
        let mut issues = Vec::new();
        let output_sum = match tx
            .output
            .iter()
            .try_fold(0u64, |sum, o| add_money(sum, o.value.to_sat()))
        {
            Some(sum) => sum,
            None => {
                issues.push("Output values exceed the money supply".to_string());
                let output_sum = tx.output.iter().fold(0u64, |sum, o| sum.saturating_add(o.value.to_sat()));
                return Funds { sufficient: false, input_sum: 0, output_sum, synthetic: false, issues };
            }
        };
        let mut input_sum: u64 = 0;

        for (index, input) in tx.input.iter().enumerate() {
            let outpoint = input.previous_output;
            if outpoint.is_null() {
                issues.push(format!("Input {} has no previous txid", index));
                continue;
            }
            let txid = outpoint.txid.to_string();
            let hint = hints
                .iter()
                .find(|h| h.txid.eq_ignore_ascii_case(&txid) && h.vout == outpoint.vout);

            let address = hint
                .and_then(|h| h.address.clone())
                .or_else(|| recover_address(input, network));

            let resolved = match address {
                Some(address) => {
                    let utxos = self.gateway.utxos(&address, network, offline).await;
                    match utxos
                        .value
                        .iter()
                        .find(|u| u.txid.eq_ignore_ascii_case(&txid) && u.vout == outpoint.vout)
                    {
                        Some(utxo) => Some(utxo.value),
                        None => {
                            issues.push(format!("UTXO not found: {}:{}", txid, outpoint.vout));
                            None
                        }
                    }
                }
                None => match hint.and_then(|h| h.value).filter(|v| *v > 0) {
                    Some(value) => Some(value as u64),
                    None => {
                        issues.push(format!("Input {} has no value and no known address", index));
                        None
                    }
                },
            };

            if let Some(value) = resolved {
                match add_money(input_sum, value) {
                    Some(sum) => input_sum = sum,
                    None => {
                        issues.push("Input values exceed the money supply".to_string());
                        return Funds { sufficient: false, input_sum: 0, output_sum, synthetic: false, issues };
                    }
                }
            }
        }

        let mut synthetic = false;
        if input_sum == 0 {
            if self.synthetic_input_leniency && !issues.is_empty() && output_sum > 0 {
                input_sum = output_sum.saturating_add(SYNTHETIC_INPUT_MARGIN);
                synthetic = true;
                metrics::record_fallback("validator");
                issues.push("Using synthetic input values; funds were not verified".to_string());
            } else {
                issues.push("Could not verify input values".to_string());
                return Funds { sufficient: false, input_sum: 0, output_sum, synthetic, issues };
            }
        }

        let sufficient = input_sum >= output_sum;
        if !sufficient {
            issues.push(format!("Inputs ({}) less than outputs ({})", input_sum, output_sum));
        }

        Funds { sufficient, input_sum, output_sum, synthetic, issues }
    }
}

/// `sum + value`, or `None` past the 21M BTC money supply.
fn add_money(sum: u64, value: u64) -> Option<u64> {
    sum.checked_add(value).filter(|total| *total <= Amount::MAX_MONEY.to_sat())
}

/// Structural checks; returns the parsed transaction or the first problem found.
fn check_structure(tx_hex: &str) -> Result<Transaction, String> {
    if !tx_hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err("Invalid hexadecimal format".to_string());
    }
    if tx_hex.len() < MIN_TX_HEX_LEN {
        return Err("Transaction too short".to_string());
    }
    let tx = decode_tx(tx_hex).map_err(|e| format!("Could not parse transaction: {}", e))?;
    if tx.input.is_empty() {
        return Err("Transaction has no inputs".to_string());
    }
    if tx.output.is_empty() {
        return Err("Transaction has no outputs".to_string());
    }
    Ok(tx)
}

/// Address whose key unlocked `input`, when recognizable from its
/// scriptSig or witness (P2PKH, P2WPKH, P2SH-P2WPKH).
pub fn recover_address(input: &TxIn, network: Network) -> Option<String> {
    let network = network.to_bitcoin();
    let pushes: Vec<&[u8]> = input
        .script_sig
        .instructions()
        .map(|ins| match ins {
            Ok(Instruction::PushBytes(bytes)) => Some(bytes.as_bytes()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    if input.witness.len() == 2 {
        let pubkey = CompressedPublicKey::from_slice(input.witness.nth(1)?).ok()?;
        return match pushes.as_slice() {
            [] => Some(Address::p2wpkh(&pubkey, network).to_string()),
            [redeem] if redeem.len() == 22 && redeem[0] == 0x00 && redeem[1] == 0x14 => {
                Some(Address::p2shwpkh(&pubkey, network).to_string())
            }
            _ => None,
        };
    }

    match pushes.as_slice() {
        [_signature, pubkey] if input.witness.is_empty() => {
            let pubkey = PublicKey::from_slice(pubkey).ok()?;
            Some(Address::p2pkh(pubkey, network).to_string())
        }
        _ => None,
    }
}
