//! End-to-end: derive an address, build, sign and validate a spend from it.

mod common;

use btc_wallet_core::chain::Network;
use btc_wallet_core::keys::ScriptFormat;
use btc_wallet_core::tx::{PrevoutSpec, TxInputSpec, TxOutputSpec};
use btc_wallet_core::WalletService;
use common::{config_for, refused_addr, start_programmable_backend, KEY_ONE, KEY_ONE_P2WPKH_SCRIPT, KEY_ONE_TB1};

const FUNDING_TXID: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";
const FUNDED: u64 = 100_000;
const PAYMENT: i64 = 90_000;

fn spend_request() -> (Vec<TxInputSpec>, Vec<TxOutputSpec>) {
    let inputs = vec![TxInputSpec {
        txid: FUNDING_TXID.to_string(),
        vout: 0,
        value: Some(FUNDED as i64),
        sequence: None,
        address: None,
    }];
    let outputs = vec![TxOutputSpec { address: KEY_ONE_TB1.to_string(), value: PAYMENT }];
    (inputs, outputs)
}

fn build_and_sign(service: &WalletService) -> String {
    let derived = service
        .derive_address(KEY_ONE, ScriptFormat::P2wpkh, Network::Test)
        .unwrap();
    assert_eq!(derived.address, KEY_ONE_TB1);
    assert!(!derived.fell_back);

    let (inputs, outputs) = spend_request();
    let built = service
        .build_transaction(&inputs, &outputs, None, Network::Test)
        .unwrap();
    assert!(!built.fallback);
    assert_eq!(built.fee, FUNDED - PAYMENT as u64);

    let prevouts = vec![Some(PrevoutSpec {
        value: FUNDED,
        script: KEY_ONE_P2WPKH_SCRIPT.to_string(),
    })];
    let signed = service.sign_transaction(&built.raw_transaction, KEY_ONE, Network::Test, &prevouts);
    assert!(signed.is_signed, "{:?}", signed.error);
    assert_eq!(signed.signature_count, 1);
    // Segwit signatures live in the witness; the txid does not move.
    assert_eq!(signed.txid, built.txid);
    assert!(signed.vsize < signed.size);

    signed.tx_hex
}

#[tokio::test]
async fn test_spend_validates_against_chain_utxos() {
    let backend = start_programmable_backend(|path: String| async move {
        if path == format!("/address/{}/utxo", KEY_ONE_TB1) {
            (
                200,
                format!(
                    r#"[{{"txid":"{}","vout":0,"value":{},"scriptpubkey":"{}","status":{{"confirmed":true}}}}]"#,
                    FUNDING_TXID, FUNDED, KEY_ONE_P2WPKH_SCRIPT
                ),
            )
        } else {
            (404, "{}".to_string())
        }
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();

    let tx_hex = build_and_sign(&service);
    let report = service.validate_transaction(&tx_hex, Network::Test, &[], false).await;

    assert!(report.is_valid, "{:?}", report.issues);
    assert!(report.issues.is_empty());
    assert!(report.details.is_signed);
    assert!(!report.details.synthetic_input_sum);
    assert_eq!(report.details.total_input, FUNDED);
    assert_eq!(report.details.fee, 10_000);
    assert!(report.details.estimated_fee_rate > 0.0);
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_unverifiable_spend_is_rejected_by_default() {
    let refused = format!("http://{}", refused_addr().await);
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&refused, dir.path())).unwrap();

    let tx_hex = build_and_sign(&service);
    let report = service.validate_transaction(&tx_hex, Network::Test, &[], false).await;

    assert!(!report.is_valid);
    assert!(!report.details.has_sufficient_funds);
    assert!(report.issues.iter().any(|i| i == "Could not verify input values"));
    assert_eq!(report.details.fee, 0);
}

#[tokio::test]
async fn test_leniency_accepts_unverifiable_spend() {
    let refused = format!("http://{}", refused_addr().await);
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_for(&refused, dir.path());
    config.validation.synthetic_input_leniency = true;
    let service = WalletService::from_config(config).unwrap();

    let tx_hex = build_and_sign(&service);
    let report = service.validate_transaction(&tx_hex, Network::Test, &[], false).await;

    assert!(report.is_valid);
    assert!(report.details.synthetic_input_sum);
    assert_eq!(report.details.total_input, PAYMENT as u64 + 1_000);
    assert!(report
        .issues
        .iter()
        .any(|i| i == "Using synthetic input values; funds were not verified"));
}

#[tokio::test]
async fn test_hint_value_funds_unknown_input() {
    let refused = format!("http://{}", refused_addr().await);
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&refused, dir.path())).unwrap();

    // Unsigned: no address can be recovered, so the hinted value is used.
    let (inputs, outputs) = spend_request();
    let built = service
        .build_transaction(&inputs, &outputs, None, Network::Test)
        .unwrap();
    let report = service
        .validate_transaction(&built.raw_transaction, Network::Test, &inputs, false)
        .await;

    assert!(report.is_valid, "{:?}", report.issues);
    assert!(!report.details.is_signed);
    assert_eq!(report.details.total_input, FUNDED);
}

#[tokio::test]
async fn test_fifty_thousand_sat_spend_with_unconfirmed_funding() {
    // The funding address exists on chain but has no matching unspent output.
    let backend = start_programmable_backend(|path: String| async move {
        if path.ends_with("/utxo") {
            (200, "[]".to_string())
        } else {
            (404, "{}".to_string())
        }
    })
    .await;
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();

    let inputs = vec![TxInputSpec {
        txid: "a".repeat(64),
        vout: 0,
        value: Some(50_000),
        sequence: None,
        address: Some(KEY_ONE_TB1.to_string()),
    }];
    let outputs = vec![TxOutputSpec { address: KEY_ONE_TB1.to_string(), value: 49_000 }];

    let built = service
        .build_transaction(&inputs, &outputs, None, Network::Test)
        .unwrap();
    assert!(!built.fallback);
    assert_eq!(built.fee, 1_000);

    // Key 2 owns nothing here; signing still yields a transaction.
    let other_key = format!("{:0>64}", "2");
    let signed = service.sign_transaction(&built.raw_transaction, &other_key, Network::Test, &[]);
    assert_eq!(signed.txid.len(), 64);
    assert_eq!(signed.input_count, 1);
    assert!(!signed.tx_hex.is_empty());

    let report = service
        .validate_transaction(&built.raw_transaction, Network::Test, &inputs, false)
        .await;
    assert!(!report.is_valid);
    assert!(!report.details.has_sufficient_funds);
    assert!(!report.details.is_signed);
    assert_eq!(report.details.fee, 0);
    assert!(report.issues.iter().any(|i| i.starts_with("UTXO not found")));
    assert!(report.issues.iter().any(|i| i == "Could not verify input values"));
    assert_eq!(backend.hits(), 1);
}
