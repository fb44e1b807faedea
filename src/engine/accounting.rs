//! Portfolio accounting: pure computations over the record history.
//!
//! Turns contribution and transaction records into pooled cash, pooled
//! holdings, valuations and ownership. Nothing here performs I/O or keeps
//! state between calls; callers load the collections fresh and pass them in.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;

use crate::prices::{fallback_price, PriceLookup, PriceOrigin};
use crate::types::{
    Asset, ContributionRecord, Holding, Holdings, Member, Side, TransactionRecord,
    MAX_UNIT_PRICE_AUD,
};

/// Percentages are distributed in basis points so they sum to 100.00.
const BASIS_POINTS: Decimal = dec!(10000);

// ---------------------------------------------------------------------------
// Contributions
// ---------------------------------------------------------------------------

/// Sum of contributed AUD, optionally for a single member.
pub fn total_contributions(records: &[ContributionRecord], member: Option<Member>) -> Decimal {
    records
        .iter()
        .filter(|r| member.map_or(true, |m| r.member == m))
        .map(|r| r.amount)
        .sum()
}

/// Contributed AUD per member. Every member is present, with zero if
/// they have never contributed.
pub fn member_totals(records: &[ContributionRecord]) -> BTreeMap<Member, Decimal> {
    let mut totals: BTreeMap<Member, Decimal> =
        Member::ALL.iter().map(|&m| (m, Decimal::ZERO)).collect();
    for record in records {
        *totals.entry(record.member).or_default() += record.amount;
    }
    totals
}

// ---------------------------------------------------------------------------
// Holdings
// ---------------------------------------------------------------------------

/// Fold `records` into an existing holdings map.
///
/// `pooled_holdings(a ++ b) == apply_transactions(pooled_holdings(a), b)`.
pub fn apply_transactions(mut holdings: Holdings, records: &[TransactionRecord]) -> Holdings {
    for tx in records {
        let entry = holdings.entry(tx.asset).or_insert_with(Holding::default);
        match tx.side {
            Side::Buy => {
                entry.quantity += tx.quantity;
                entry.cost_basis += tx.cost_basis();
            }
        }
    }
    holdings
}

/// Quantity and cost basis per asset accumulated over the full history.
pub fn pooled_holdings(records: &[TransactionRecord]) -> Holdings {
    apply_transactions(Holdings::new(), records)
}

/// Total AUD spent across every asset, fees included.
pub fn total_cost_basis(holdings: &Holdings) -> Decimal {
    holdings.values().map(|h| h.cost_basis).sum()
}

// ---------------------------------------------------------------------------
// Cash
// ---------------------------------------------------------------------------

/// Pool cash not yet spent on purchases.
///
/// Not clamped: a negative result means the history spends more than was
/// contributed, and the caller decides how to surface that.
pub fn available_cash(
    contributions: &[ContributionRecord],
    transactions: &[TransactionRecord],
) -> Decimal {
    total_contributions(contributions, None) - total_cost_basis(&pooled_holdings(transactions))
}

/// How far purchases exceed contributions, if they do.
pub fn overspend(
    contributions: &[ContributionRecord],
    transactions: &[TransactionRecord],
) -> Option<Decimal> {
    let cash = available_cash(contributions, transactions);
    (cash < Decimal::ZERO).then(|| -cash)
}

// ---------------------------------------------------------------------------
// Valuation
// ---------------------------------------------------------------------------

/// Price to value `asset` at: the looked-up price when it is usable
/// (positive and at most `MAX_UNIT_PRICE_AUD`), otherwise the documented
/// fallback constant.
pub fn resolve_price<L: PriceLookup + ?Sized>(lookup: &L, asset: Asset) -> (Decimal, PriceOrigin) {
    match lookup.price(asset) {
        Some(price) if price > Decimal::ZERO && price <= MAX_UNIT_PRICE_AUD => {
            (price, PriceOrigin::Live)
        }
        _ => (fallback_price(asset), PriceOrigin::Fallback),
    }
}

/// Market value of the holdings in AUD.
pub fn portfolio_value<L: PriceLookup + ?Sized>(holdings: &Holdings, lookup: &L) -> Decimal {
    holdings
        .iter()
        .map(|(&asset, h)| h.quantity * resolve_price(lookup, asset).0)
        .sum()
}

/// Market value minus cost basis. Negative for an unrealized loss.
pub fn unrealized_gain<L: PriceLookup + ?Sized>(holdings: &Holdings, lookup: &L) -> Decimal {
    portfolio_value(holdings, lookup) - total_cost_basis(holdings)
}

// ---------------------------------------------------------------------------
// Ownership
// ---------------------------------------------------------------------------

/// Each member's share of total contributions, in `[0, 1]`.
///
/// When nothing has been contributed every fraction is zero.
pub fn ownership_fractions(records: &[ContributionRecord]) -> BTreeMap<Member, Decimal> {
    let totals = member_totals(records);
    let pool: Decimal = totals.values().copied().sum();

    if pool.is_zero() {
        return totals.into_keys().map(|m| (m, Decimal::ZERO)).collect();
    }

    totals
        .into_iter()
        .map(|(m, amount)| (m, amount / pool))
        .collect()
}

/// Ownership as percentages with two decimals that sum to exactly 100.00.
///
/// Uses the largest-remainder method on basis points; ties go to the
/// member listed first in the roster. All zero when nothing was contributed.
pub fn ownership_percentages(records: &[ContributionRecord]) -> BTreeMap<Member, Decimal> {
    let totals = member_totals(records);
    let pool: Decimal = totals.values().copied().sum();

    if pool.is_zero() {
        return totals.into_keys().map(|m| (m, Decimal::ZERO)).collect();
    }

    let mut points: BTreeMap<Member, Decimal> = BTreeMap::new();
    let mut remainders: Vec<(Member, Decimal)> = Vec::with_capacity(totals.len());
    for (member, amount) in &totals {
        let raw = *amount * BASIS_POINTS / pool;
        let floor = raw.floor();
        points.insert(*member, floor);
        remainders.push((*member, raw - floor));
    }

    // Stable sort keeps roster order among equal remainders.
    remainders.sort_by(|a, b| b.1.cmp(&a.1));

    let mut leftover = BASIS_POINTS - points.values().copied().sum::<Decimal>();
    for (member, _) in remainders {
        if leftover <= Decimal::ZERO {
            break;
        }
        if let Some(p) = points.get_mut(&member) {
            *p += Decimal::ONE;
        }
        leftover -= Decimal::ONE;
    }

    points
        .into_iter()
        .map(|(m, bp)| (m, (bp / dec!(100)).round_dp(2)))
        .collect()
}

/// A member's claim on the current market value of the holdings.
pub fn member_equity_value<L: PriceLookup + ?Sized>(
    member: Member,
    contributions: &[ContributionRecord],
    holdings: &Holdings,
    lookup: &L,
) -> Decimal {
    let fraction = ownership_fractions(contributions)
        .get(&member)
        .copied()
        .unwrap_or(Decimal::ZERO);
    fraction * portfolio_value(holdings, lookup)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
