//! Accountant: reconciles the record history into a club report.
//!
//! Pulls every engine computation together for one point in time: pooled
//! cash, holdings and valuation, per-member ownership and equity, weekly
//! movement, and the conditions worth flagging (fallback prices, skipped
//! records, spending beyond contributions).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use tracing::{info, warn};

use super::accounting::{
    available_cash, member_totals, overspend, ownership_fractions, ownership_percentages,
    pooled_holdings, resolve_price, total_contributions, total_cost_basis,
};
use super::performance::{
    contribution_streak, roi_by_asset, weekly_performance, AssetReturn, WeeklyPerformance,
};
use crate::prices::{PriceLookup, PriceOrigin};
use crate::storage::Loaded;
use crate::types::{Asset, Collection, ContributionRecord, Holdings, Member, TransactionRecord};

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

/// Conditions the caller may want to show the user. None of them stop the
/// report from being produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportWarning {
    /// A held asset had no live price and was valued at the fallback constant.
    PriceFallback { asset: Asset },
    /// Purchases exceed contributions by `shortfall` AUD.
    InconsistentHistory { shortfall: Decimal },
    /// Stored elements skipped while loading.
    RejectedRecords { collection: Collection, count: usize },
}

/// Valuation of one asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetValuation {
    pub asset: Asset,
    pub quantity: Decimal,
    pub cost_basis: Decimal,
    pub price: Decimal,
    pub price_origin: PriceOrigin,
    pub market_value: Decimal,
}

/// One member's line in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MemberLine {
    pub member: Member,
    pub contributed: Decimal,
    /// Share of the pool in `[0, 1]`.
    pub fraction: Decimal,
    /// Display percentage; all members sum to 100.00.
    pub percentage: Decimal,
    /// Fraction × portfolio value.
    pub equity_value: Decimal,
    pub weekly: WeeklyPerformance,
    pub streak_weeks: u32,
}

/// Everything the dashboard and CLI show, computed in one pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClubReport {
    pub club_name: String,
    pub generated_at: DateTime<Utc>,
    pub contribution_count: usize,
    pub transaction_count: usize,
    pub total_contributions: Decimal,
    pub total_cost_basis: Decimal,
    pub available_cash: Decimal,
    pub portfolio_value: Decimal,
    pub unrealized_gain: Decimal,
    /// Portfolio value plus unspent cash.
    pub pool_value: Decimal,
    pub holdings: Holdings,
    pub valuations: Vec<AssetValuation>,
    pub members: Vec<MemberLine>,
    pub roi: BTreeMap<Asset, AssetReturn>,
    pub warnings: Vec<ReportWarning>,
}

impl ClubReport {
    pub fn member(&self, member: Member) -> Option<&MemberLine> {
        self.members.iter().find(|m| m.member == member)
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Markdown weekly summary for sharing with the group.
    pub fn render_weekly_summary(&self) -> String {
        let mut out = String::new();
        let gain_pct = if self.total_contributions > Decimal::ZERO {
            (self.pool_value - self.total_contributions) / self.total_contributions
                * Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        let _ = writeln!(out, "# {} Weekly Summary", self.club_name);
        let _ = writeln!(out, "**Generated:** {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
        let _ = writeln!(out);
        let _ = writeln!(out, "## Portfolio");
        let _ = writeln!(out, "- **Total Invested:** ${:.2} AUD", self.total_contributions);
        let _ = writeln!(out, "- **Crypto Value:** ${:.2} AUD", self.portfolio_value);
        let _ = writeln!(out, "- **Available Cash:** ${:.2} AUD", self.available_cash);
        let _ = writeln!(
            out,
            "- **Gain/Loss:** ${:.2} AUD ({:.1}%)",
            self.pool_value - self.total_contributions,
            gain_pct
        );
        let _ = writeln!(out, "- **Unrealized Gain/Loss:** ${:.2} AUD", self.unrealized_gain);

        for v in self.valuations.iter().filter(|v| !v.quantity.is_zero()) {
            let marker = match v.price_origin {
                PriceOrigin::Live => "",
                PriceOrigin::Fallback => " (fallback price)",
            };
            let _ = writeln!(
                out,
                "- {}: {} @ ${:.2}{marker} = ${:.2} AUD",
                v.asset, v.quantity, v.price, v.market_value
            );
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "## Members");
        for line in &self.members {
            let _ = writeln!(out);
            let _ = writeln!(out, "### {}", line.member);
            let _ = writeln!(out, "- Contributions Added: ${:.2} AUD", line.weekly.contributions_added);
            let _ = writeln!(out, "- Ownership Change: {:+.1}%", line.weekly.ownership_change);
            let _ = writeln!(out, "- Current Ownership: {:.2}%", line.percentage);
            let _ = writeln!(out, "- Equity Value: ${:.2} AUD", line.equity_value);
            let _ = writeln!(out, "- Contribution Streak: {} weeks", line.streak_weeks);
        }

        if self.has_warnings() {
            let _ = writeln!(out);
            let _ = writeln!(out, "## Warnings");
            for w in &self.warnings {
                let _ = writeln!(out, "- {}", describe_warning(w));
            }
        }
        out
    }
}

fn describe_warning(w: &ReportWarning) -> String {
    match w {
        ReportWarning::PriceFallback { asset } => {
            format!("{asset} valued at fallback price (live price unavailable)")
        }
        ReportWarning::InconsistentHistory { shortfall } => {
            format!("Purchases exceed contributions by ${shortfall:.2} AUD")
        }
        ReportWarning::RejectedRecords { collection, count } => {
            format!("{count} malformed {collection} record(s) skipped")
        }
    }
}

// ---------------------------------------------------------------------------
// Accountant
// ---------------------------------------------------------------------------

pub struct Accountant;

impl Accountant {
    /// Build a report from freshly loaded collections and a price lookup.
    pub fn summarize<L: PriceLookup + ?Sized>(
        club_name: &str,
        contributions: &Loaded<ContributionRecord>,
        transactions: &Loaded<TransactionRecord>,
        prices: &L,
        now: DateTime<Utc>,
    ) -> ClubReport {
        let contribs = &contributions.records;
        let txs = &transactions.records;
        let mut warnings = Vec::new();

        for (collection, count) in [
            (Collection::Contributions, contributions.rejected.len()),
            (Collection::Transactions, transactions.rejected.len()),
        ] {
            if count > 0 {
                warnings.push(ReportWarning::RejectedRecords { collection, count });
            }
        }

        let holdings = pooled_holdings(txs);
        let valuations: Vec<AssetValuation> = Asset::ALL
            .iter()
            .map(|&asset| {
                let held = holdings.get(&asset).copied().unwrap_or_default();
                let (price, price_origin) = resolve_price(prices, asset);
                AssetValuation {
                    asset,
                    quantity: held.quantity,
                    cost_basis: held.cost_basis,
                    price,
                    price_origin,
                    market_value: held.quantity * price,
                }
            })
            .collect();

        for v in &valuations {
            if v.price_origin == PriceOrigin::Fallback && v.quantity > Decimal::ZERO {
                warnings.push(ReportWarning::PriceFallback { asset: v.asset });
            }
        }

        let cash = available_cash(contribs, txs);
        if let Some(shortfall) = overspend(contribs, txs) {
            warn!(%shortfall, "Purchases exceed contributions");
            warnings.push(ReportWarning::InconsistentHistory { shortfall });
        }

        let total_in = total_contributions(contribs, None);
        let cost = total_cost_basis(&holdings);
        let value: Decimal = valuations.iter().map(|v| v.market_value).sum();

        let totals = member_totals(contribs);
        let fractions = ownership_fractions(contribs);
        let percentages = ownership_percentages(contribs);
        let mut weekly = weekly_performance(contribs, now);
        let today = now.date_naive();
        let share = |map: &BTreeMap<Member, Decimal>, member: Member| {
            map.get(&member).copied().unwrap_or(Decimal::ZERO)
        };

        let members = Member::ALL
            .iter()
            .map(|&member| {
                let fraction = share(&fractions, member);
                MemberLine {
                    member,
                    contributed: share(&totals, member),
                    fraction,
                    percentage: share(&percentages, member),
                    equity_value: fraction * value,
                    weekly: weekly.remove(&member).unwrap_or(WeeklyPerformance {
                        contributions_added: Decimal::ZERO,
                        current_ownership: Decimal::ZERO,
                        ownership_change: Decimal::ZERO,
                    }),
                    streak_weeks: contribution_streak(member, contribs, today),
                }
            })
            .collect();

        let report = ClubReport {
            club_name: club_name.to_string(),
            generated_at: now,
            contribution_count: contribs.len(),
            transaction_count: txs.len(),
            total_contributions: total_in,
            total_cost_basis: cost,
            available_cash: cash,
            portfolio_value: value,
            unrealized_gain: value - cost,
            pool_value: value + cash,
            roi: roi_by_asset(&holdings, prices),
            holdings,
            valuations,
            members,
            warnings,
        };

        info!(
            contributions = report.contribution_count,
            transactions = report.transaction_count,
            invested = format!("${:.2}", report.total_contributions),
            cash = format!("${:.2}", report.available_cash),
            value = format!("${:.2}", report.portfolio_value),
            gain = format!("${:.2}", report.unrealized_gain),
            warnings = report.warnings.len(),
            "Club reconciled"
        );

        report
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
