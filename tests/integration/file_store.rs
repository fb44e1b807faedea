//! Reading hand-edited and older data directories.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clubledger::engine::{Club, PurchaseRequest, ReportWarning};
use clubledger::export::ExportKind;
use clubledger::prices::PriceService;
use clubledger::storage::{JsonFileStore, RecordStore};
use clubledger::types::{Asset, Collection, Member};

use crate::mock_prices::MockPrices;

fn seeded_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("clubledger_fs_{tag}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

const LEGACY_CONTRIBUTIONS: &str = r#"{
    "Charles": [
        {"amount": 75.0, "date": "2025-01-06", "timestamp": "2025-01-06T19:02:11.512000"}
    ],
    "Ross Parmenter": [
        {"amount": 75.0, "timestamp": "2025-01-06T19:03:40"}
    ],
    "Jayden Kenna": [],
    "Brad Johnson": [
        {"amount": 150.0, "date": "2025-01-07", "timestamp": "2025-01-07"}
    ]
}"#;

const LEGACY_TRANSACTIONS: &str = r#"[
    {"crypto": "BTC", "amount": 0.001, "price": 150000.0, "transaction_fee": 4.5,
     "type": "buy", "timestamp": "2025-01-08T08:00:00"},
    {"crypto": "ETH", "amount": 0.01, "price": 5500.0, "timestamp": "2025-01-08T08:05:00Z"}
]"#;

#[test]
fn test_legacy_layout_is_readable() {
    let dir = seeded_dir("legacy");
    fs::write(dir.join("contributions.json"), LEGACY_CONTRIBUTIONS).unwrap();
    fs::write(dir.join("transactions.json"), LEGACY_TRANSACTIONS).unwrap();

    let store = JsonFileStore::open(&dir).unwrap();
    let contributions = store.load_contributions().unwrap();
    assert!(contributions.is_clean());
    assert_eq!(contributions.records.len(), 3);
    let brad: Decimal = contributions
        .records
        .iter()
        .filter(|r| r.member == Member::BradJohnson)
        .map(|r| r.amount)
        .sum();
    assert_eq!(brad, dec!(150));

    let transactions = store.load_transactions().unwrap();
    assert!(transactions.is_clean());
    assert_eq!(transactions.records.len(), 2);
    assert_eq!(transactions.records[0].asset, Asset::Btc);
    assert_eq!(transactions.records[0].cost_basis(), dec!(154.5));
    assert_eq!(transactions.records[1].fee, Decimal::ZERO);
    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_append_rewrites_legacy_contributions_as_array() {
    let dir = seeded_dir("migrate");
    fs::write(dir.join("contributions.json"), LEGACY_CONTRIBUTIONS).unwrap();
    fs::write(dir.join("transactions.json"), LEGACY_TRANSACTIONS).unwrap();

    let feed = MockPrices::new()
        .with_quote(Asset::Btc, dec!(150000))
        .with_quote(Asset::Eth, dec!(5500));
    let prices = PriceService::new(Arc::new(feed), Duration::from_millis(500));
    let club = Club::new("Legacy Club", Arc::new(JsonFileStore::open(&dir).unwrap()), prices);

    club.record_contribution(Member::JaydenKenna, dec!(75), None).unwrap();

    let raw: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(dir.join("contributions.json")).unwrap()).unwrap();
    let items = raw.as_array().expect("contributions rewritten as an array");
    assert_eq!(items.len(), 4);
    assert!(items.iter().all(|item| item.get("member").is_some()));

    // 375 in, 154.5 + 55 spent.
    let report = club.report(Utc::now()).await.unwrap();
    assert_eq!(report.total_contributions, dec!(375));
    assert_eq!(report.available_cash, dec!(165.5));
    assert_eq!(report.unrealized_gain, dec!(-4.5));
    assert_eq!(report.member(Member::BradJohnson).unwrap().percentage, dec!(40));
    let _ = fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_malformed_records_are_skipped_and_flagged() {
    let dir = seeded_dir("malformed");
    fs::write(
        dir.join("contributions.json"),
        r#"[
            {"member": "Charles", "amount": 75, "timestamp": "2025-06-01T10:00:00Z"},
            {"member": "Charles", "amount": "lots", "timestamp": "2025-06-01T10:00:00Z"},
            {"member": "Dave", "amount": 75, "timestamp": "2025-06-01T10:00:00Z"}
        ]"#,
    )
    .unwrap();

    let feed = MockPrices::new();
    let prices = PriceService::new(Arc::new(feed), Duration::from_millis(500));
    let club = Club::new("Messy Club", Arc::new(JsonFileStore::open(&dir).unwrap()), prices);

    let report = club.report(Utc::now()).await.unwrap();
    assert_eq!(report.contribution_count, 1);
    assert_eq!(report.total_contributions, dec!(75));
    assert!(report.warnings.contains(&ReportWarning::RejectedRecords {
        collection: Collection::Contributions,
        count: 2,
    }));
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn test_purchase_refreshes_holdings_snapshot() {
    let dir = seeded_dir("snapshot");
    let store = Arc::new(JsonFileStore::open(&dir).unwrap());
    let prices = PriceService::new(Arc::new(MockPrices::new()), Duration::from_millis(500));
    let club = Club::new("Snapshot Club", store.clone(), prices);

    assert!(store.load_holdings_snapshot().unwrap().is_none());

    club.record_weekly_round(dec!(75), None).unwrap();
    club.record_purchase(PurchaseRequest {
        asset: Asset::Eth,
        quantity: dec!(0.05),
        unit_price: dec!(5000),
        fee: dec!(2),
        date: None,
        notes: Some("first ETH".into()),
    })
    .unwrap();

    let snapshot = store.load_holdings_snapshot().unwrap().unwrap();
    let eth = snapshot.holdings[&Asset::Eth];
    assert_eq!(eth.quantity, dec!(0.05));
    assert_eq!(eth.cost_basis, dec!(252));
    assert!(dir.join(Collection::Holdings.file_name()).exists());
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn test_non_array_transactions_file_is_an_error() {
    let dir = seeded_dir("bad_shape");
    fs::write(dir.join("transactions.json"), r#"{"BTC": []}"#).unwrap();
    let store = JsonFileStore::open(&dir).unwrap();
    assert!(store.load_transactions().is_err());
    let _ = fs::remove_dir_all(dir);
}

#[test]
fn test_legacy_data_exports_to_csv() {
    let dir = seeded_dir("export");
    fs::write(dir.join("contributions.json"), LEGACY_CONTRIBUTIONS).unwrap();
    fs::write(dir.join("transactions.json"), LEGACY_TRANSACTIONS).unwrap();

    let prices = PriceService::new(Arc::new(MockPrices::new()), Duration::from_millis(500));
    let club = Club::new("Legacy Club", Arc::new(JsonFileStore::open(&dir).unwrap()), prices);

    let contributions = club.export_csv(ExportKind::Contributions).unwrap();
    assert_eq!(contributions.lines().count(), 4);
    assert!(contributions.contains("Brad Johnson,150"));

    let holdings = club.export_csv(ExportKind::Holdings).unwrap();
    let assets: Vec<&str> = holdings
        .lines()
        .skip(1)
        .filter_map(|line| line.split(',').next())
        .collect();
    assert_eq!(assets, vec!["BTC", "ETH"]);
    let _ = fs::remove_dir_all(dir);
}
