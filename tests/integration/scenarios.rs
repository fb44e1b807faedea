//! End-to-end club scenarios over a file-backed store.
//!
//! Each test gets its own data directory and a `MockPrices` feed, then drives
//! the club the way the CLI and dashboard do: record, reload, report.

use chrono::{NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clubledger::engine::{Club, PurchaseRequest, ReportWarning};
use clubledger::prices::{PriceOrigin, PriceService, FALLBACK_BTC_AUD, FALLBACK_ETH_AUD};
use clubledger::storage::JsonFileStore;
use clubledger::types::{Asset, ClubError, Member};

use crate::mock_prices::MockPrices;

fn temp_dir(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("clubledger_it_{tag}_{}", uuid::Uuid::new_v4()))
}

fn open_club(dir: &PathBuf, feed: &MockPrices) -> Club {
    let store = JsonFileStore::open(dir).unwrap();
    let prices = PriceService::new(Arc::new(feed.clone()), Duration::from_millis(500));
    Club::new("Integration Club", Arc::new(store), prices)
}

fn buy(asset: Asset, quantity: Decimal, unit_price: Decimal, fee: Decimal) -> PurchaseRequest {
    PurchaseRequest {
        asset,
        quantity,
        unit_price,
        fee,
        date: NaiveDate::from_ymd_opt(2025, 6, 2),
        notes: None,
    }
}

#[tokio::test]
async fn test_first_week_round_and_purchase() {
    let dir = temp_dir("first_week");
    let feed = MockPrices::new()
        .with_quote(Asset::Btc, dec!(65000))
        .with_quote(Asset::Eth, dec!(4000));
    let club = open_club(&dir, &feed);

    club.record_weekly_round(dec!(75), NaiveDate::from_ymd_opt(2025, 6, 1))
        .unwrap();
    club.record_purchase(buy(Asset::Btc, dec!(0.002), dec!(60000), dec!(5)))
        .unwrap();

    // Reopen from disk so nothing is carried over in memory.
    let club = open_club(&dir, &feed);
    let now = Utc.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap();
    let report = club.report(now).await.unwrap();

    assert_eq!(report.total_contributions, dec!(300));
    assert_eq!(report.total_cost_basis, dec!(125));
    assert_eq!(report.available_cash, dec!(175));
    assert_eq!(report.portfolio_value, dec!(130));
    assert_eq!(report.unrealized_gain, dec!(5));
    assert_eq!(report.pool_value, dec!(305));
    assert!(!report.has_warnings());

    for member in Member::ALL {
        let line = report.member(member).unwrap();
        assert_eq!(line.fraction, dec!(0.25));
        assert_eq!(line.percentage, dec!(25));
        assert_eq!(line.equity_value, dec!(32.5));
    }

    let btc = report.valuations.iter().find(|v| v.asset == Asset::Btc).unwrap();
    assert_eq!(btc.price_origin, PriceOrigin::Live);
    assert_eq!(btc.market_value, dec!(130));

    assert_eq!(feed.calls(), 2);
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_feed_outage_values_at_fallback() {
    let dir = temp_dir("outage");
    let feed = MockPrices::new();
    feed.set_error("rate limited");
    let club = open_club(&dir, &feed);

    club.record_weekly_round(dec!(100), None).unwrap();
    club.record_purchase(buy(Asset::Eth, dec!(0.02), dec!(5000), Decimal::ZERO))
        .unwrap();

    let report = club.report(Utc::now()).await.unwrap();
    let eth = report.valuations.iter().find(|v| v.asset == Asset::Eth).unwrap();
    assert_eq!(eth.price, FALLBACK_ETH_AUD);
    assert_eq!(eth.price_origin, PriceOrigin::Fallback);
    assert_eq!(report.portfolio_value, dec!(105));
    assert_eq!(report.unrealized_gain, dec!(5));
    // Only the held asset is flagged.
    assert_eq!(
        report.warnings,
        vec![ReportWarning::PriceFallback { asset: Asset::Eth }]
    );

    // Feed recovers: live prices are used again on the next report.
    feed.clear_error();
    feed.set_quote(Asset::Btc, dec!(90000));
    feed.set_quote(Asset::Eth, dec!(6000));
    let report = club.report(Utc::now()).await.unwrap();
    assert_eq!(report.portfolio_value, dec!(120));
    assert!(!report.has_warnings());

    let btc = report.valuations.iter().find(|v| v.asset == Asset::Btc).unwrap();
    assert_ne!(btc.price, FALLBACK_BTC_AUD);
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_purchase_beyond_pool_is_refused() {
    let dir = temp_dir("overspend");
    let feed = MockPrices::new().with_quote(Asset::Btc, dec!(60000));
    let club = open_club(&dir, &feed);

    club.record_contribution(Member::Charles, dec!(50), None).unwrap();
    let err = club
        .record_purchase(buy(Asset::Btc, dec!(0.001), dec!(60000), dec!(1)))
        .unwrap_err();
    match err.downcast_ref::<ClubError>() {
        Some(ClubError::InsufficientCash { needed, available }) => {
            assert_eq!(*needed, dec!(61));
            assert_eq!(*available, dec!(50));
        }
        other => panic!("expected InsufficientCash, got {other:?}"),
    }
    assert!(club.transactions().unwrap().is_empty());

    // Exactly the available cash is allowed.
    club.record_purchase(buy(Asset::Btc, dec!(0.0008), dec!(60000), dec!(2)))
        .unwrap();
    let report = club.report(Utc::now()).await.unwrap();
    assert_eq!(report.available_cash, Decimal::ZERO);
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_uneven_contributions_split_ownership() {
    let dir = temp_dir("uneven");
    let feed = MockPrices::new()
        .with_quote(Asset::Btc, dec!(60000))
        .with_quote(Asset::Eth, dec!(5000));
    let club = open_club(&dir, &feed);

    club.record_contribution(Member::Charles, dec!(100), None).unwrap();
    club.record_contribution(Member::RossParmenter, dec!(100), None).unwrap();
    club.record_contribution(Member::JaydenKenna, dec!(100), None).unwrap();

    let report = club.report(Utc::now()).await.unwrap();
    let brad = report.member(Member::BradJohnson).unwrap();
    assert_eq!(brad.fraction, Decimal::ZERO);
    assert_eq!(brad.percentage, Decimal::ZERO);

    let total: Decimal = report.members.iter().map(|m| m.percentage).sum();
    assert_eq!(total, dec!(100));
    assert_eq!(report.member(Member::Charles).unwrap().percentage, dec!(33.34));
    assert_eq!(report.member(Member::JaydenKenna).unwrap().percentage, dec!(33.33));
    let _ = std::fs::remove_dir_all(dir);
}

#[tokio::test]
async fn test_empty_club_reports_zeroes() {
    let dir = temp_dir("empty");
    let club = open_club(&dir, &MockPrices::new());

    let report = club.report(Utc::now()).await.unwrap();
    assert_eq!(report.total_contributions, Decimal::ZERO);
    assert_eq!(report.available_cash, Decimal::ZERO);
    assert_eq!(report.portfolio_value, Decimal::ZERO);
    assert!(report.members.iter().all(|m| m.fraction.is_zero()));

    let summary = report.render_weekly_summary();
    assert!(summary.contains("Integration Club"));
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn test_invalid_contribution_rejected_without_runtime() {
    let dir = temp_dir("invalid");
    let club = open_club(&dir, &MockPrices::new());

    let err = club
        .record_contribution(Member::BradJohnson, Decimal::ZERO, None)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ClubError>(),
        Some(ClubError::InvalidInput(_))
    ));

    club.record_contribution(Member::BradJohnson, dec!(75), None).unwrap();
    let report = tokio_test::block_on(club.report(Utc::now())).unwrap();
    assert_eq!(report.member(Member::BradJohnson).unwrap().fraction, Decimal::ONE);
    let _ = std::fs::remove_dir_all(dir);
}
