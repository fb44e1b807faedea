//! Reference prices.
//!
//! Defines the `PriceSource` trait for live price feeds, the synchronous
//! `PriceLookup` capability the accounting engine consumes, and the
//! `PriceService` that bounds every live fetch with a timeout. A failed or
//! slow fetch is logged and left out of the resulting `PriceTable`; the
//! engine substitutes the fallback constant for anything missing.

pub mod coingecko;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::Asset;

// ---------------------------------------------------------------------------
// Fallback prices
// ---------------------------------------------------------------------------

/// Static BTC price in AUD used when no live quote is available.
pub const FALLBACK_BTC_AUD: Decimal = dec!(97500);

/// Static ETH price in AUD used when no live quote is available.
pub const FALLBACK_ETH_AUD: Decimal = dec!(5250);

/// The documented fallback price for an asset.
pub fn fallback_price(asset: Asset) -> Decimal {
    match asset {
        Asset::Btc => FALLBACK_BTC_AUD,
        Asset::Eth => FALLBACK_ETH_AUD,
    }
}

/// Where a price used in a valuation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceOrigin {
    Live,
    Fallback,
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Abstraction over live price feeds.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current unit price of `asset` in AUD.
    async fn fetch_price(&self, asset: Asset) -> Result<Decimal>;

    /// Source name for logging.
    fn name(&self) -> &str;
}

/// Synchronous asset → price mapping consumed by the accounting engine.
/// `None` means "no usable price"; the engine decides what to do about it.
pub trait PriceLookup {
    fn price(&self, asset: Asset) -> Option<Decimal>;
}

impl PriceLookup for HashMap<Asset, Decimal> {
    fn price(&self, asset: Asset) -> Option<Decimal> {
        self.get(&asset).copied()
    }
}

impl PriceLookup for BTreeMap<Asset, Decimal> {
    fn price(&self, asset: Asset) -> Option<Decimal> {
        self.get(&asset).copied()
    }
}

/// A lookup that never has a price (every valuation uses fallbacks).
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrices;

impl PriceLookup for NoPrices {
    fn price(&self, _asset: Asset) -> Option<Decimal> {
        None
    }
}

// ---------------------------------------------------------------------------
// Price table
// ---------------------------------------------------------------------------

/// Live quotes gathered for one request. Assets whose fetch failed are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceTable {
    quotes: BTreeMap<Asset, Decimal>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, asset: Asset, price: Decimal) {
        self.quotes.insert(asset, price);
    }

    pub fn with(mut self, asset: Asset, price: Decimal) -> Self {
        self.insert(asset, price);
        self
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl PriceLookup for PriceTable {
    fn price(&self, asset: Asset) -> Option<Decimal> {
        self.quotes.get(&asset).copied()
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

/// Wraps a `PriceSource` with a per-call timeout.
#[derive(Clone)]
pub struct PriceService {
    source: Arc<dyn PriceSource>,
    timeout: Duration,
}

impl PriceService {
    pub fn new(source: Arc<dyn PriceSource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Fetch one live price. Errors, timeouts and non-positive quotes
    /// all yield `None`.
    pub async fn quote(&self, asset: Asset) -> Option<Decimal> {
        match tokio::time::timeout(self.timeout, self.source.fetch_price(asset)).await {
            Ok(Ok(price)) if price > Decimal::ZERO => {
                debug!(source = self.source.name(), %asset, %price, "Live price fetched");
                Some(price)
            }
            Ok(Ok(price)) => {
                warn!(source = self.source.name(), %asset, %price, "Ignoring non-positive price");
                None
            }
            Ok(Err(e)) => {
                warn!(source = self.source.name(), %asset, error = %e, "Price fetch failed, using fallback");
                None
            }
            Err(_) => {
                warn!(
                    source = self.source.name(),
                    %asset,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Price fetch timed out, using fallback"
                );
                None
            }
        }
    }

    /// Fetch every supported asset concurrently.
    pub async fn fetch_all(&self) -> PriceTable {
        let quotes = futures::future::join_all(
            Asset::ALL.iter().map(|&asset| async move { (asset, self.quote(asset).await) }),
        )
        .await;

        let mut table = PriceTable::new();
        for (asset, quote) in quotes {
            if let Some(price) = quote {
                table.insert(asset, price);
            }
        }
        table
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
