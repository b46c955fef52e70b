//! Unsigned transaction construction.

use bitcoin::absolute::LockTime;
use bitcoin::transaction::Version;
use bitcoin::{Address, Amount, OutPoint, ScriptBuf, Sequence, Transaction, TxIn, TxOut, Txid, Witness};
use std::str::FromStr;

use crate::chain::types::Network;
use crate::error::{WalletError, WalletResult};
use crate::observability::metrics;
use crate::tx::types::{encode_tx, BuildResult, TxInputSpec, TxOutputSpec};

const MAX_MONEY: u64 = 21_000_000 * 100_000_000; // == Amount::MAX_MONEY.to_sat()

/// Builds version-2 transactions from input and output specs.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionBuilder;

impl TransactionBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build an unsigned transaction.
    ///
    /// Malformed requests are rejected up front. Anything that goes wrong
    /// during construction (bad txid, foreign address) yields an empty
    /// placeholder transaction flagged with `fallback` instead of an error.
    /// The fee is implied by the input and output values; `fee_rate` is
    /// informational.
    pub fn build(
        &self,
        inputs: &[TxInputSpec],
        outputs: &[TxOutputSpec],
        fee_rate: Option<f64>,
        network: Network,
    ) -> WalletResult<BuildResult> {
        check_request(inputs, outputs)?;

        let total_input = money_total(inputs.iter().map(|i| i.value.unwrap_or(0)), "input")?;
        let total_output = money_total(outputs.iter().map(|o| o.value), "output")?;
        let fee = total_input.saturating_sub(total_output);

        tracing::info!(
            network = %network,
            inputs = inputs.len(),
            outputs = outputs.len(),
            fee_rate = ?fee_rate,
            "Building transaction"
        );

        let (tx, fallback, warning) = match assemble(inputs, outputs, network) {
            Ok(tx) => (tx, false, None),
            Err(reason) => {
                metrics::record_fallback("builder");
                tracing::warn!(network = %network, error = %reason, "Transaction construction failed, returning placeholder");
                (placeholder(), true, Some(format!("returned placeholder transaction: {}", reason)))
            }
        };

        let txid = tx.compute_txid().to_string();
        tracing::debug!(txid = %txid, fee, fallback, "Transaction built");

        Ok(BuildResult {
            raw_transaction: encode_tx(&tx),
            txid,
            fee,
            total_input,
            total_output,
            fallback,
            warning,
        })
    }
}

fn check_request(inputs: &[TxInputSpec], outputs: &[TxOutputSpec]) -> WalletResult<()> {
    if inputs.is_empty() {
        return Err(WalletError::InvalidRequest("inputs cannot be empty".to_string()));
    }
    if outputs.is_empty() {
        return Err(WalletError::InvalidRequest("outputs cannot be empty".to_string()));
    }
    if let Some(output) = outputs.iter().find(|o| o.value <= 0) {
        return Err(WalletError::InvalidRequest(format!(
            "output to {} has invalid value {}: must be greater than zero",
            output.address, output.value
        )));
    }
    if let Some(input) = inputs.iter().find(|i| i.value.is_some_and(|v| v < 0)) {
        return Err(WalletError::InvalidRequest(format!(
            "input {}:{} has a negative value",
            input.txid, input.vout
        )));
    }
    if let Some(output) = outputs.iter().find(|o| o.value as u64 > MAX_MONEY) {
        return Err(WalletError::InvalidRequest(format!(
            "output to {} has value {} above the money supply",
            output.address, output.value
        )));
    }
    if let Some(input) = inputs.iter().find(|i| i.value.is_some_and(|v| v as u64 > MAX_MONEY)) {
        return Err(WalletError::InvalidRequest(format!(
            "input {}:{} has a value above the money supply",
            input.txid, input.vout
        )));
    }
    Ok(())
}

/// Sum of non-negative satoshi values, rejected past the money supply.
fn money_total(mut values: impl Iterator<Item = i64>, side: &str) -> WalletResult<u64> {
    values
        .try_fold(0u64, |sum, value| sum.checked_add(value as u64).filter(|total| *total <= MAX_MONEY))
        .ok_or_else(|| WalletError::InvalidRequest(format!("total {} value exceeds the money supply", side)))
}

fn assemble(inputs: &[TxInputSpec], outputs: &[TxOutputSpec], network: Network) -> Result<Transaction, String> {
    let input = inputs
        .iter()
        .map(|spec| {
            let txid = Txid::from_str(&spec.txid).map_err(|e| format!("invalid txid '{}': {}", spec.txid, e))?;
            Ok(TxIn {
                previous_output: OutPoint { txid, vout: spec.vout },
                script_sig: ScriptBuf::new(),
                sequence: spec.sequence.map(Sequence).unwrap_or(Sequence::MAX),
                witness: Witness::new(),
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    let output = outputs
        .iter()
        .map(|spec| {
            let address = Address::from_str(&spec.address)
                .map_err(|e| format!("invalid address '{}': {}", spec.address, e))?
                .require_network(network.to_bitcoin())
                .map_err(|e| format!("address '{}' is not for {}: {}", spec.address, network, e))?;
            Ok(TxOut {
                value: Amount::from_sat(spec.value as u64),
                script_pubkey: address.script_pubkey(),
            })
        })
        .collect::<Result<Vec<_>, String>>()?;

    Ok(Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input,
        output,
    })
}

fn placeholder() -> Transaction {
    Transaction {
        version: Version::TWO,
        lock_time: LockTime::ZERO,
        input: Vec::new(),
        output: Vec::new(),
    }
}
