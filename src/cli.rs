//! CLI definition and dispatch.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::dashboard::{self, routes::DashboardState};
use crate::engine::{Club, ClubReport, PurchaseRequest};
use crate::export::ExportKind;
use crate::prices::coingecko::CoinGeckoClient;
use crate::prices::{PriceOrigin, PriceService};
use crate::storage::JsonFileStore;
use crate::types::{Asset, Member};

#[derive(Parser, Debug)]
#[command(name = "clubledger", about = "Investment club contribution and crypto ledger")]
pub struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the dashboard API server
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Print the current portfolio summary
    Summary {
        /// Emit the full report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the weekly markdown summary
    Weekly,
    /// Record a contribution for one member
    Contribute {
        /// Full or first name
        member: String,
        amount: Decimal,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record the same contribution for every member
    ContributeAll {
        /// Defaults to the configured weekly contribution
        amount: Option<Decimal>,
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Record a crypto purchase paid from pooled cash
    Buy {
        asset: Asset,
        quantity: Decimal,
        /// AUD per unit
        unit_price: Decimal,
        #[arg(long, default_value = "0")]
        fee: Decimal,
        #[arg(long)]
        date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// List every recorded contribution and transaction
    History,
    /// Write CSV backups of contributions, transactions and holdings
    Export {
        /// Directory to write the CSV files into
        #[arg(long, default_value = "exports")]
        dir: PathBuf,
        /// Export a single table instead of all three
        #[arg(long)]
        only: Option<ExportKind>,
    },
}

/// Load configuration, falling back to defaults when the file is absent.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    AppConfig::load(&path.to_string_lossy())
}

/// Build the club service from configuration.
pub fn build_club(cfg: &AppConfig) -> Result<Club> {
    let store = JsonFileStore::open(&cfg.storage.data_dir)?;
    let source = CoinGeckoClient::new(
        cfg.prices.base_url.clone(),
        cfg.prices.api_key(),
        cfg.prices.timeout(),
    )?;
    let prices = PriceService::new(Arc::new(source), cfg.prices.timeout());
    Ok(Club::new(cfg.club.name.clone(), Arc::new(store), prices))
}

pub async fn run(cli: Cli, cfg: AppConfig) -> Result<()> {
    let club = build_club(&cfg)?;

    match cli.command {
        Command::Serve { port } => {
            let port = port.unwrap_or(cfg.dashboard.port);
            if !cfg.dashboard.enabled {
                warn!("Dashboard disabled in config; starting anyway because `serve` was requested");
            }
            let state = Arc::new(DashboardState::new(club, cfg.club.weekly_contribution));
            let shutdown = async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received.");
            };
            dashboard::serve(state, port, shutdown).await
        }
        Command::Summary { json } => {
            let report = club.report(Utc::now()).await?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&report).context("Failed to serialise report")?
                );
            } else {
                print_summary(&report);
            }
            Ok(())
        }
        Command::Weekly => {
            let report = club.report(Utc::now()).await?;
            print!("{}", report.render_weekly_summary());
            Ok(())
        }
        Command::Contribute { member, amount, date } => {
            let member: Member = member.parse()?;
            let record = club.record_contribution(member, amount, date)?;
            println!("Recorded: {record}");
            Ok(())
        }
        Command::ContributeAll { amount, date } => {
            let amount = amount.unwrap_or(cfg.club.weekly_contribution);
            for record in club.record_weekly_round(amount, date)? {
                println!("Recorded: {record}");
            }
            Ok(())
        }
        Command::Buy {
            asset,
            quantity,
            unit_price,
            fee,
            date,
            notes,
        } => {
            let record = club.record_purchase(PurchaseRequest {
                asset,
                quantity,
                unit_price,
                fee,
                date,
                notes,
            })?;
            println!("Recorded: {record}");
            Ok(())
        }
        Command::History => {
            println!("Contributions:");
            for record in club.contributions()? {
                println!("  {record}");
            }
            println!("Transactions:");
            for record in club.transactions()? {
                println!("  {record}");
            }
            Ok(())
        }
        Command::Export { dir, only } => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create export directory {}", dir.display()))?;
            let kinds = match only {
                Some(kind) => vec![kind],
                None => ExportKind::ALL.to_vec(),
            };
            for kind in kinds {
                let path = dir.join(kind.file_name());
                std::fs::write(&path, club.export_csv(kind)?)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("Exported {kind} to {}", path.display());
            }
            Ok(())
        }
    }
}

fn print_summary(report: &ClubReport) {
    println!("{}", report.club_name);
    println!("  Total invested:   ${:>12.2} AUD", report.total_contributions);
    println!("  Available cash:   ${:>12.2} AUD", report.available_cash);
    println!("  Portfolio value:  ${:>12.2} AUD", report.portfolio_value);
    println!("  Unrealized gain:  ${:>12.2} AUD", report.unrealized_gain);
    println!();
    for v in &report.valuations {
        let origin = match v.price_origin {
            PriceOrigin::Live => "live",
            PriceOrigin::Fallback => "fallback",
        };
        println!(
            "  {:<4} qty {:<14} @ ${:.2} ({origin}) = ${:.2}",
            v.asset, v.quantity, v.price, v.market_value
        );
    }
    println!();
    for m in &report.members {
        println!(
            "  {:<16} ${:>10.2}  {:>6.2}%  equity ${:.2}",
            m.member.name(),
            m.contributed,
            m.percentage,
            m.equity_value
        );
    }
    if report.has_warnings() {
        println!();
        for w in &report.warnings {
            println!("  warning: {}", serde_json::to_string(w).unwrap_or_default());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_buy_command() {
        let cli = Cli::try_parse_from([
            "clubledger", "buy", "btc", "0.002", "60000", "--fee", "5", "--date", "2025-06-01",
        ])
        .unwrap();
        match cli.command {
            Command::Buy { asset, quantity, unit_price, fee, date, .. } => {
                assert_eq!(asset, Asset::Btc);
                assert_eq!(quantity, dec!(0.002));
                assert_eq!(unit_price, dec!(60000));
                assert_eq!(fee, dec!(5));
                assert_eq!(date, NaiveDate::from_ymd_opt(2025, 6, 1));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.config, PathBuf::from("config.toml"));
    }

    #[test]
    fn test_parse_contribute_all_default_amount() {
        let cli = Cli::try_parse_from(["clubledger", "--config", "other.toml", "contribute-all"]).unwrap();
        assert!(matches!(cli.command, Command::ContributeAll { amount: None, date: None }));
        assert_eq!(cli.config, PathBuf::from("other.toml"));
    }

    #[test]
    fn test_parse_export_command() {
        let cli = Cli::try_parse_from(["clubledger", "export", "--only", "holdings.csv"]).unwrap();
        match cli.command {
            Command::Export { dir, only } => {
                assert_eq!(dir, PathBuf::from("exports"));
                assert_eq!(only, Some(ExportKind::Holdings));
            }
            other => panic!("unexpected command: {other:?}"),
        }
        assert!(Cli::try_parse_from(["clubledger", "export", "--only", "prices"]).is_err());
    }

    #[tokio::test]
    async fn test_export_writes_all_tables() {
        let mut cfg = AppConfig::default();
        let root = std::env::temp_dir().join(format!("clubledger_export_{}", uuid::Uuid::new_v4()));
        cfg.storage.data_dir = root.join("data");
        build_club(&cfg)
            .unwrap()
            .record_weekly_round(dec!(75), None)
            .unwrap();

        let out = root.join("out");
        let cli = Cli::try_parse_from(["clubledger", "export", "--dir", out.to_str().unwrap()]).unwrap();
        run(cli, cfg).await.unwrap();

        for kind in ExportKind::ALL {
            assert!(out.join(kind.file_name()).exists());
        }
        let contributions = std::fs::read_to_string(out.join("contributions.csv")).unwrap();
        assert_eq!(contributions.lines().count(), 5);
        let _ = std::fs::remove_dir_all(root);
    }

    #[test]
    fn test_parse_rejects_unknown_asset() {
        assert!(Cli::try_parse_from(["clubledger", "buy", "doge", "1", "1"]).is_err());
    }

    #[test]
    fn test_load_config_missing_file_defaults() {
        let cfg = load_config(&PathBuf::from("/nonexistent/clubledger.toml")).unwrap();
        assert_eq!(cfg.club.weekly_contribution, dec!(75));
    }

    #[test]
    fn test_build_club_uses_data_dir() {
        let mut cfg = AppConfig::default();
        let dir = std::env::temp_dir().join(format!("clubledger_cli_{}", uuid::Uuid::new_v4()));
        cfg.storage.data_dir = dir.clone();
        let club = build_club(&cfg).unwrap();
        assert_eq!(club.name(), "Cryptogeezas Investment Club");
        assert!(dir.exists());
        let _ = std::fs::remove_dir_all(dir);
    }
}
