//! Mock price feed for integration testing.
//!
//! Provides a deterministic `PriceSource` that serves fixed quotes, can be
//! switched into a failing mode, and counts how often it was called.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use clubledger::prices::PriceSource;
use clubledger::types::Asset;

/// A price feed whose quotes and failures are controlled by the test.
#[derive(Clone, Default)]
pub struct MockPrices {
    quotes: Arc<Mutex<HashMap<Asset, Decimal>>>,
    /// If set, every fetch returns this error.
    force_error: Arc<Mutex<Option<String>>>,
    calls: Arc<AtomicUsize>,
}

impl MockPrices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quote(self, asset: Asset, price: Decimal) -> Self {
        self.set_quote(asset, price);
        self
    }

    pub fn set_quote(&self, asset: Asset, price: Decimal) {
        self.quotes.lock().unwrap().insert(asset, price);
    }

    /// Force all subsequent fetches to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for MockPrices {
    async fn fetch_price(&self, asset: Asset) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.force_error.lock().unwrap().clone() {
            return Err(anyhow!(msg));
        }
        self.quotes
            .lock()
            .unwrap()
            .get(&asset)
            .copied()
            .ok_or_else(|| anyhow!("no quote for {asset}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
