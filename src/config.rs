//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the optional CoinGecko key) are referenced by env-var name in
//! the config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::types::ClubError;

/// Every amount, quote and fallback price is in Australian dollars.
pub const SUPPORTED_CURRENCY: &str = "AUD";

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub club: ClubConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub prices: PricesConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClubConfig {
    pub name: String,
    pub currency: String,
    /// Default per-member amount for a weekly round.
    pub weekly_contribution: Decimal,
}

impl Default for ClubConfig {
    fn default() -> Self {
        Self {
            name: "Cryptogeezas Investment Club".into(),
            currency: SUPPORTED_CURRENCY.into(),
            weekly_contribution: dec!(75),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    /// Directory holding the record collections.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PricesConfig {
    /// Price feed to use. Only "coingecko" is supported.
    pub provider: String,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    /// Name of the env var holding a CoinGecko demo API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            provider: "coingecko".into(),
            base_url: None,
            timeout_secs: 10,
            api_key_env: None,
        }
    }
}

impl PricesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    /// The API key, if an env var is configured and set.
    pub fn api_key(&self) -> Option<String> {
        self.api_key_env
            .as_deref()
            .and_then(|env| AppConfig::resolve_env(env).ok())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8501,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        if config.prices.provider != "coingecko" {
            return Err(ClubError::Config(format!(
                "unsupported price provider: {}",
                config.prices.provider
            ))
            .into());
        }
        if !config.club.currency.eq_ignore_ascii_case(SUPPORTED_CURRENCY) {
            return Err(ClubError::Config(format!(
                "unsupported club currency: {} (prices and fallbacks are {SUPPORTED_CURRENCY})",
                config.club.currency
            ))
            .into());
        }
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
