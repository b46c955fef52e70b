//! Transaction request and result types.

use bitcoin::consensus::{deserialize, serialize};
use bitcoin::Transaction;
use serde::{Deserialize, Serialize};

/// Reference to a previous output being spent.
///
/// Also used as an input hint for validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInputSpec {
    pub txid: String,
    pub vout: u32,
    /// Value in satoshis, when known.
    #[serde(default)]
    pub value: Option<i64>,
    #[serde(default)]
    pub sequence: Option<u32>,
    /// Address owning the output, when known.
    #[serde(default)]
    pub address: Option<String>,
}

/// A payment to an address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutputSpec {
    pub address: String,
    /// Value in satoshis; must be positive.
    pub value: i64,
}

/// Output spent by an input, supplied to the signer for segwit and taproot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrevoutSpec {
    pub value: u64,
    /// Locking script, hex.
    pub script: String,
}

/// Outcome of building an unsigned transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    pub raw_transaction: String,
    pub txid: String,
    /// Implied fee: inputs minus outputs, never negative.
    pub fee: u64,
    pub total_input: u64,
    pub total_output: u64,
    /// True when a placeholder was returned instead of the requested transaction.
    pub fallback: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Outcome of a signing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignResult {
    pub tx_hex: String,
    pub txid: String,
    pub is_signed: bool,
    pub signature_count: usize,
    pub input_count: usize,
    pub output_count: usize,
    /// Serialized size in bytes.
    pub size: usize,
    /// Virtual size in vbytes.
    pub vsize: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Facts gathered while validating a transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationDetails {
    pub is_valid_structure: bool,
    pub has_sufficient_funds: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locktime: Option<u32>,
    pub inputs_count: usize,
    pub outputs_count: usize,
    pub total_input: u64,
    pub total_output: u64,
    pub fee: u64,
    pub is_signed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub txid: Option<String>,
    pub vsize: usize,
    /// sat/vB; zero unless funds are sufficient.
    pub estimated_fee_rate: f64,
    /// True when input values were substituted rather than resolved.
    pub synthetic_input_sum: bool,
}

/// Outcome of validating a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub details: ValidationDetails,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub issues: Vec<String>,
}

/// Parse a hex-encoded transaction.
pub fn decode_tx(tx_hex: &str) -> Result<Transaction, String> {
    let bytes = hex::decode(tx_hex.trim()).map_err(|e| format!("invalid hex: {}", e))?;
    deserialize(&bytes).map_err(|e| format!("invalid transaction: {}", e))
}

/// Hex-encode a transaction.
pub fn encode_tx(tx: &Transaction) -> String {
    hex::encode(serialize(tx))
}

/// Txid reported when no transaction could be parsed.
pub const NULL_TXID: &str = "0000000000000000000000000000000000000000000000000000000000000000";
