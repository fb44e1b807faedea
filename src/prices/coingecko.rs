//! CoinGecko live price feed.
//!
//! API: `GET {base}/simple/price?ids=bitcoin&vs_currencies=aud`
//! Auth: none for the public tier; an optional demo key is sent as the
//! `x-cg-demo-api-key` header. Public rate limit is roughly 10-30 req/min,
//! which is plenty for one lookup per page view.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::PriceSource;
use crate::types::{Asset, ClubError};

pub const DEFAULT_BASE_URL: &str = "https://api.coingecko.com/api/v3";
const SOURCE_NAME: &str = "coingecko";
const QUOTE_CURRENCY: &str = "aud";

/// CoinGecko coin id for an asset.
pub fn coin_id(asset: Asset) -> &'static str {
    match asset {
        Asset::Btc => "bitcoin",
        Asset::Eth => "ethereum",
    }
}

/// `{"bitcoin": {"aud": 152000.12}}`
type SimplePriceResponse = HashMap<String, HashMap<String, Decimal>>;

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
}

pub struct CoinGeckoClient {
    http: Client,
    base_url: String,
    api_key: Option<Secret<String>>,
}

impl CoinGeckoClient {
    pub fn new(base_url: Option<String>, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .user_agent("CLUBLEDGER/0.1.0")
            .build()
            .context("Failed to build CoinGecko HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(Secret::new),
        })
    }

    fn price_url(&self, asset: Asset) -> String {
        format!(
            "{}/simple/price?ids={}&vs_currencies={QUOTE_CURRENCY}",
            self.base_url,
            urlencoding::encode(coin_id(asset)),
        )
    }
}

/// Pull the AUD quote for `asset` out of a `/simple/price` response.
fn extract_price(body: &SimplePriceResponse, asset: Asset) -> Result<Decimal, ClubError> {
    let id = coin_id(asset);
    body.get(id)
        .and_then(|quotes| quotes.get(QUOTE_CURRENCY))
        .copied()
        .ok_or_else(|| ClubError::PriceUnavailable {
            asset,
            reason: format!("no {QUOTE_CURRENCY} quote for {id} in response"),
        })
}

#[async_trait]
impl PriceSource for CoinGeckoClient {
    async fn fetch_price(&self, asset: Asset) -> Result<Decimal> {
        let url = self.price_url(asset);
        let mut req = self.http.get(&url);
        if let Some(key) = &self.api_key {
            req = req.header("x-cg-demo-api-key", key.expose_secret().as_str());
        }

        let resp = req
            .send()
            .await
            .with_context(|| format!("CoinGecko request failed for {asset}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let detail = resp
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|b| b.error)
                .unwrap_or_default();
            anyhow::bail!("CoinGecko API error for {asset}: {status} {detail}");
        }

        let body: SimplePriceResponse = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse CoinGecko response for {asset}"))?;

        let price = extract_price(&body, asset)?;
        debug!(%asset, %price, "CoinGecko quote");
        Ok(price)
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}
