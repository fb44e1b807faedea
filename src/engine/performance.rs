//! Member and asset performance analytics.
//!
//! Week-over-week ownership movement, contribution streaks and per-asset
//! return on investment. Built on the accounting primitives; callers pass
//! `now`/`today` explicitly so results are reproducible.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::accounting::{member_totals, ownership_fractions, resolve_price};
use crate::prices::{PriceLookup, PriceOrigin};
use crate::types::{Asset, ContributionRecord, Holdings, Member};

/// How one member's position moved over the trailing seven days.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyPerformance {
    /// AUD contributed in the last seven days.
    pub contributions_added: Decimal,
    /// Ownership now, in percent.
    pub current_ownership: Decimal,
    /// Percentage-point change against seven days ago.
    pub ownership_change: Decimal,
}

/// Return on investment for one held asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetReturn {
    pub quantity: Decimal,
    pub invested: Decimal,
    pub price: Decimal,
    pub price_origin: PriceOrigin,
    pub current_value: Decimal,
    pub roi_pct: Decimal,
}

/// Per-member contribution and ownership movement over the last week.
pub fn weekly_performance(
    contributions: &[ContributionRecord],
    now: DateTime<Utc>,
) -> BTreeMap<Member, WeeklyPerformance> {
    let cutoff = (now - Duration::days(7)).date_naive();
    let earlier: Vec<ContributionRecord> = contributions
        .iter()
        .filter(|r| r.effective_date() <= cutoff)
        .cloned()
        .collect();

    let totals_now = member_totals(contributions);
    let totals_then = member_totals(&earlier);
    let share_now = ownership_fractions(contributions);
    let share_then = ownership_fractions(&earlier);

    Member::ALL
        .iter()
        .map(|&member| {
            let pct_now = share_now[&member] * dec!(100);
            let pct_then = share_then[&member] * dec!(100);
            (
                member,
                WeeklyPerformance {
                    contributions_added: totals_now[&member] - totals_then[&member],
                    current_ownership: pct_now.round_dp(2),
                    ownership_change: (pct_now - pct_then).round_dp(2),
                },
            )
        })
        .collect()
}

/// Consecutive ISO weeks, ending with the week containing `today`, in which
/// `member` contributed at least once.
pub fn contribution_streak(
    member: Member,
    contributions: &[ContributionRecord],
    today: NaiveDate,
) -> u32 {
    let weeks: HashSet<_> = contributions
        .iter()
        .filter(|r| r.member == member)
        .map(|r| r.effective_date().iso_week())
        .collect();

    let mut streak = 0;
    let mut cursor = today;
    while weeks.contains(&cursor.iso_week()) {
        streak += 1;
        cursor -= Duration::weeks(1);
    }
    streak
}

/// ROI per asset with a non-zero investment.
pub fn roi_by_asset<L: PriceLookup + ?Sized>(
    holdings: &Holdings,
    lookup: &L,
) -> BTreeMap<Asset, AssetReturn> {
    holdings
        .iter()
        .filter(|(_, h)| h.cost_basis > Decimal::ZERO)
        .map(|(&asset, h)| {
            let (price, price_origin) = resolve_price(lookup, asset);
            let current_value = h.quantity * price;
            let roi_pct = ((current_value - h.cost_basis) / h.cost_basis * dec!(100)).round_dp(2);
            (
                asset,
                AssetReturn {
                    quantity: h.quantity,
                    invested: h.cost_basis,
                    price,
                    price_origin,
                    current_value,
                    roi_pct,
                },
            )
        })
        .collect()
}
