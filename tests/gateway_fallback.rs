//! Chain gateway and fee estimator behaviour against a mock chain source.

mod common;

use btc_wallet_core::chain::{Availability, DataSource, FeeSource, Network, TxState};
use btc_wallet_core::WalletService;
use common::{config_for, refused_addr, start_programmable_backend};

const ADDRESS: &str = "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx";
const TXID: &str = "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

async fn esplora_backend() -> common::MockBackend {
    start_programmable_backend(|path: String| async move {
        match path.as_str() {
            p if p.ends_with("/utxo") => (
                200,
                format!(
                    r#"[{{"txid":"{}","vout":1,"value":50000,"status":{{"confirmed":true,"block_height":100}}}}]"#,
                    TXID
                ),
            ),
            p if p.starts_with("/address/") => (
                200,
                r#"{"chain_stats":{"funded_txo_sum":80000,"spent_txo_sum":30000},"mempool_stats":{"funded_txo_sum":1000,"spent_txo_sum":0}}"#
                    .to_string(),
            ),
            p if p.starts_with("/tx/") => (
                200,
                r#"{"status":{"confirmed":true,"block_height":100,"block_hash":"00ff","block_time":1700000000}}"#
                    .to_string(),
            ),
            "/blocks/tip/height" => (200, "105".to_string()),
            "/v1/fees/recommended" => (
                200,
                r#"{"fastestFee":21,"halfHourFee":12,"hourFee":8,"economyFee":3,"minimumFee":1}"#.to_string(),
            ),
            _ => (404, "{}".to_string()),
        }
    })
    .await
}

#[tokio::test]
async fn test_live_balance_then_fresh_cache() {
    let backend = esplora_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();

    let first = service.get_balance(ADDRESS, Network::Test, false).await;
    assert_eq!(first.source, DataSource::Live);
    assert_eq!(first.value.confirmed, 50_000);
    assert_eq!(first.value.unconfirmed, 1_000);
    assert_eq!(first.availability(), Availability::Data);

    let hits = backend.hits();
    let second = service.get_balance(ADDRESS, Network::Test, false).await;
    assert_eq!(second.source, DataSource::FreshCache);
    assert_eq!(second.value, first.value);
    assert_eq!(backend.hits(), hits);
}

#[tokio::test]
async fn test_esplora_utxos_are_normalized() {
    let backend = esplora_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();

    let lookup = service.get_utxos(ADDRESS, Network::Test, false).await;
    assert_eq!(lookup.source, DataSource::Live);
    assert_eq!(lookup.value.len(), 1);
    let utxo = &lookup.value[0];
    assert_eq!(utxo.txid, TXID);
    assert_eq!(utxo.vout, 1);
    assert_eq!(utxo.value, 50_000);
    assert_eq!(utxo.confirmations, 1);
    assert_eq!(utxo.address, ADDRESS);
}

#[tokio::test]
async fn test_stale_cache_survives_restart_and_outage() {
    let backend = esplora_backend().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = config_for(&backend.base_url(), dir.path());
    config.cache.ttl_secs = 0;
    let online = WalletService::from_config(config).unwrap();
    assert_eq!(online.get_balance(ADDRESS, Network::Test, false).await.source, DataSource::Live);

    // New process, source gone, every entry already expired.
    let refused = format!("http://{}", refused_addr().await);
    let mut config = config_for(&refused, dir.path());
    config.cache.ttl_secs = 0;
    let outage = WalletService::from_config(config).unwrap();

    let lookup = outage.get_balance(ADDRESS, Network::Test, false).await;
    assert_eq!(lookup.source, DataSource::StaleCache);
    assert_eq!(lookup.value.confirmed, 50_000);

    let unknown = outage.get_balance("tb1qunknown", Network::Test, false).await;
    assert_eq!(unknown.source, DataSource::Default);
    assert_eq!(unknown.availability(), Availability::Unknown);
}

#[tokio::test]
async fn test_offline_never_touches_the_network() {
    let backend = esplora_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();

    let balance = service.get_balance(ADDRESS, Network::Test, true).await;
    let utxos = service.get_utxos(ADDRESS, Network::Test, true).await;
    let status = service.get_transaction_status(TXID, Network::Test, true).await.unwrap();
    let fees = service.estimate_fees(Network::Test, true).await;

    assert_eq!(balance.source, DataSource::Default);
    assert!(utxos.value.is_empty());
    assert_eq!(status.status, TxState::Unknown);
    assert_eq!(fees.source, FeeSource::Fallback);
    assert_eq!(backend.hits(), 0);
}

#[tokio::test]
async fn test_transaction_status_from_tip_height() {
    let backend = esplora_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();

    let status = service.get_transaction_status(TXID, Network::Test, false).await.unwrap();
    assert_eq!(status.confirmations, 6);
    assert_eq!(status.status, TxState::Confirmed);
    assert_eq!(status.block_height, Some(100));
    assert_eq!(status.block_hash.as_deref(), Some("00ff"));
    assert_eq!(status.explorer_url, format!("https://blockstream.info/testnet/tx/{}", TXID));
}

#[tokio::test]
async fn test_fee_estimate_is_fetched_then_cached() {
    let backend = esplora_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();

    let estimate = service.estimate_fees(Network::Test, false).await;
    assert_eq!(estimate.source, FeeSource::Mempool);
    assert_eq!(estimate.high, 21.0);
    assert_eq!(estimate.medium, 12.0);
    assert_eq!(estimate.low, 3.0);
    assert_eq!(estimate.min, 8.0);

    let hits = backend.hits();
    assert_eq!(service.estimate_fees(Network::Test, false).await, estimate);
    assert_eq!(backend.hits(), hits);
}

#[tokio::test]
async fn test_connectivity_probe() {
    let backend = esplora_backend().await;
    let dir = tempfile::tempdir().unwrap();
    let reachable = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();
    assert!(!reachable.is_offline(Network::Test).await);

    let refused = format!("http://{}", refused_addr().await);
    let unreachable = WalletService::from_config(config_for(&refused, dir.path())).unwrap();
    assert!(unreachable.is_offline(Network::Test).await);
}

#[tokio::test]
async fn test_server_error_degrades() {
    let backend = start_programmable_backend(|_path: String| async { (500, "{}".to_string()) }).await;
    let dir = tempfile::tempdir().unwrap();
    let service = WalletService::from_config(config_for(&backend.base_url(), dir.path())).unwrap();

    let lookup = service.get_utxos(ADDRESS, Network::Test, false).await;
    assert_eq!(lookup.source, DataSource::Default);
    assert!(service.estimate_fees(Network::Test, false).await.source == FeeSource::Fallback);
    assert!(backend.hits() >= 2);
}
