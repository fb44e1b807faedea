//! Shared types for the club ledger.
//!
//! These types form the data model used across all modules: the fixed
//! member roster, the tradeable assets, the two append-only record kinds
//! and the derived holding type. Storage, pricing, the engine and the
//! dashboard all depend on this module and never on each other's internals.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Current on-disk record format version.
pub const RECORD_VERSION: u32 = 1;

fn record_version() -> u32 {
    RECORD_VERSION
}

/// Largest AUD amount a single record may carry (contribution, unit price,
/// fee or total cost). Keeps every sum over the history inside `Decimal`.
pub const MAX_AMOUNT_AUD: Decimal = dec!(1000000000000000);

/// Largest quantity of an asset a single purchase may carry. Bounds
/// quantity × price for any usable price.
pub const MAX_QUANTITY: Decimal = dec!(1000000000);

/// Largest unit price treated as a usable quote.
pub const MAX_UNIT_PRICE_AUD: Decimal = MAX_AMOUNT_AUD;

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

/// One of the four club members. Identity only; never mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Member {
    #[serde(rename = "Charles")]
    Charles,
    #[serde(rename = "Ross Parmenter")]
    RossParmenter,
    #[serde(rename = "Jayden Kenna")]
    JaydenKenna,
    #[serde(rename = "Brad Johnson")]
    BradJohnson,
}

impl Member {
    /// The full roster, in display order.
    pub const ALL: [Member; 4] = [
        Member::Charles,
        Member::RossParmenter,
        Member::JaydenKenna,
        Member::BradJohnson,
    ];

    /// Display name as stored in record files.
    pub fn name(&self) -> &'static str {
        match self {
            Member::Charles => "Charles",
            Member::RossParmenter => "Ross Parmenter",
            Member::JaydenKenna => "Jayden Kenna",
            Member::BradJohnson => "Brad Johnson",
        }
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Parse a member from either the full name or the first name
/// (case-insensitive).
impl std::str::FromStr for Member {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Member::ALL
            .into_iter()
            .find(|m| {
                let full = m.name().to_lowercase();
                full == wanted || full.split_whitespace().next() == Some(wanted.as_str())
            })
            .ok_or_else(|| ClubError::InvalidInput(format!("Unknown member: {s}")))
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// A cryptocurrency the club can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Asset {
    #[serde(rename = "BTC")]
    Btc,
    #[serde(rename = "ETH")]
    Eth,
}

impl Asset {
    pub const ALL: [Asset; 2] = [Asset::Btc, Asset::Eth];

    /// Ticker symbol.
    pub fn symbol(&self) -> &'static str {
        match self {
            Asset::Btc => "BTC",
            Asset::Eth => "ETH",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Asset::Btc => "Bitcoin",
            Asset::Eth => "Ethereum",
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

impl std::str::FromStr for Asset {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "btc" | "bitcoin" => Ok(Asset::Btc),
            "eth" | "ethereum" => Ok(Asset::Eth),
            _ => Err(ClubError::InvalidInput(format!("Unsupported asset: {s}"))),
        }
    }
}

/// Transaction direction. Only purchases are recorded; a sell side would
/// have to reduce quantity and realise gain/loss against cost basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Side {
    #[default]
    #[serde(rename = "buy", alias = "BUY", alias = "Buy")]
    Buy,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A single cash contribution by a member, in AUD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributionRecord {
    #[serde(default = "record_version")]
    pub version: u32,
    pub member: Member,
    pub amount: Decimal,
    /// Date the money was contributed (may differ from entry time).
    #[serde(default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// When the record was entered.
    #[serde(with = "flexible_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl ContributionRecord {
    pub fn new(member: Member, amount: Decimal, date: Option<NaiveDate>) -> Self {
        Self {
            version: RECORD_VERSION,
            member,
            amount,
            date,
            timestamp: Utc::now(),
        }
    }

    /// The contribution date, falling back to the entry date.
    pub fn effective_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| self.timestamp.date_naive())
    }

    /// Reject records that would corrupt derived totals.
    pub fn validate(&self) -> Result<(), ClubError> {
        check_version(self.version)?;
        if self.amount < Decimal::ZERO {
            return Err(ClubError::MalformedRecord(format!(
                "negative contribution amount {}",
                self.amount
            )));
        }
        if self.amount > MAX_AMOUNT_AUD {
            return Err(ClubError::MalformedRecord(format!(
                "contribution amount {} exceeds {MAX_AMOUNT_AUD}",
                self.amount
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ContributionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ${:.2} AUD",
            self.effective_date(),
            self.member,
            self.amount,
        )
    }
}

/// A manual crypto purchase paid from pooled cash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default = "record_version")]
    pub version: u32,
    #[serde(alias = "crypto")]
    pub asset: Asset,
    #[serde(default, alias = "type")]
    pub side: Side,
    /// Units of the asset acquired.
    #[serde(alias = "amount")]
    pub quantity: Decimal,
    /// AUD per unit at time of purchase.
    #[serde(alias = "price")]
    pub unit_price: Decimal,
    /// Exchange fee in AUD.
    #[serde(default, alias = "transaction_fee")]
    pub fee: Decimal,
    #[serde(default, with = "optional_date", skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(with = "flexible_timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl TransactionRecord {
    pub fn buy(asset: Asset, quantity: Decimal, unit_price: Decimal, fee: Decimal) -> Self {
        Self {
            version: RECORD_VERSION,
            asset,
            side: Side::Buy,
            quantity,
            unit_price,
            fee,
            date: None,
            timestamp: Utc::now(),
            notes: None,
        }
    }

    /// Total AUD spent: quantity × unit price + fee.
    ///
    /// Only call on validated records; use `checked_cost_basis` otherwise.
    pub fn cost_basis(&self) -> Decimal {
        self.quantity * self.unit_price + self.fee
    }

    /// `cost_basis` that returns `None` instead of overflowing.
    pub fn checked_cost_basis(&self) -> Option<Decimal> {
        self.quantity
            .checked_mul(self.unit_price)?
            .checked_add(self.fee)
    }

    pub fn effective_date(&self) -> NaiveDate {
        self.date.unwrap_or_else(|| self.timestamp.date_naive())
    }

    /// Reject records with negative quantities or amounts.
    pub fn validate(&self) -> Result<(), ClubError> {
        check_version(self.version)?;
        for (field, value) in [
            ("quantity", self.quantity),
            ("unit_price", self.unit_price),
            ("fee", self.fee),
        ] {
            if value < Decimal::ZERO {
                return Err(ClubError::MalformedRecord(format!(
                    "negative {field} {value}"
                )));
            }
        }
        self.check_bounds().map_err(ClubError::MalformedRecord)?;
        Ok(())
    }

    /// Size limits shared by stored records and new purchases. Returns the
    /// reason on failure so each caller can pick its error kind.
    pub fn check_bounds(&self) -> Result<Decimal, String> {
        if self.quantity > MAX_QUANTITY {
            return Err(format!("quantity {} exceeds {MAX_QUANTITY}", self.quantity));
        }
        for (field, value) in [("unit_price", self.unit_price), ("fee", self.fee)] {
            if value > MAX_AMOUNT_AUD {
                return Err(format!("{field} {value} exceeds {MAX_AMOUNT_AUD}"));
            }
        }
        match self.checked_cost_basis() {
            Some(cost) if cost <= MAX_AMOUNT_AUD => Ok(cost),
            Some(cost) => Err(format!("total cost {cost} exceeds {MAX_AMOUNT_AUD}")),
            None => Err("total cost overflows".to_string()),
        }
    }
}

impl fmt::Display for TransactionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} @ ${:.2} (fee ${:.2}) = ${:.2} AUD",
            self.effective_date(),
            self.side,
            self.quantity,
            self.asset,
            self.unit_price,
            self.fee,
            self.cost_basis(),
        )
    }
}

fn check_version(version: u32) -> Result<(), ClubError> {
    if version > RECORD_VERSION {
        return Err(ClubError::MalformedRecord(format!(
            "unsupported record version {version} (max {RECORD_VERSION})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Derived holdings
// ---------------------------------------------------------------------------

/// Accumulated position in one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Holding {
    pub quantity: Decimal,
    /// AUD spent including fees.
    pub cost_basis: Decimal,
}

impl Holding {
    /// Average AUD paid per unit, fees included. `None` for an empty position.
    pub fn average_cost(&self) -> Option<Decimal> {
        if self.quantity.is_zero() {
            None
        } else {
            Some(self.cost_basis / self.quantity)
        }
    }
}

/// Pooled holdings keyed by asset. Ordered so output is deterministic.
pub type Holdings = BTreeMap<Asset, Holding>;

/// Cached copy of the last computed holdings. Written for convenience,
/// never used as an input to accounting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoldingsSnapshot {
    #[serde(default = "record_version")]
    pub version: u32,
    #[serde(with = "flexible_timestamp")]
    pub taken_at: DateTime<Utc>,
    pub holdings: Holdings,
}

impl HoldingsSnapshot {
    pub fn new(holdings: Holdings) -> Self {
        Self {
            version: RECORD_VERSION,
            taken_at: Utc::now(),
            holdings,
        }
    }
}

/// The persisted record collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Contributions,
    Transactions,
    Holdings,
}

impl Collection {
    pub fn file_name(&self) -> &'static str {
        match self {
            Collection::Contributions => "contributions.json",
            Collection::Transactions => "transactions.json",
            Collection::Holdings => "portfolio.json",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Contributions => write!(f, "contributions"),
            Collection::Transactions => write!(f, "transactions"),
            Collection::Holdings => write!(f, "holdings"),
        }
    }
}

// ---------------------------------------------------------------------------
// Timestamp parsing
// ---------------------------------------------------------------------------

/// Parse an RFC 3339 timestamp, a naive ISO-8601 date-time (read as UTC)
/// or a bare `YYYY-MM-DD` date (midnight UTC).
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, ClubError> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(ClubError::MalformedRecord(format!("unparseable timestamp: {s}")))
}

/// Parse a date, accepting a full timestamp and keeping its date part.
pub fn parse_date(s: &str) -> Result<NaiveDate, ClubError> {
    match NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
        Ok(date) => Ok(date),
        Err(_) => parse_timestamp(s).map(|dt| dt.date_naive()),
    }
}

mod flexible_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_timestamp(&raw).map_err(de::Error::custom)
    }
}

mod optional_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        match Option::<String>::deserialize(d)? {
            Some(raw) if !raw.trim().is_empty() => {
                super::parse_date(&raw).map(Some).map_err(de::Error::custom)
            }
            _ => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for the club ledger.
#[derive(Debug, thiserror::Error)]
pub enum ClubError {
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    #[error("Price unavailable for {asset}: {reason}")]
    PriceUnavailable { asset: Asset, reason: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Insufficient cash: need ${needed:.2}, have ${available:.2}")]
    InsufficientCash { needed: Decimal, available: Decimal },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
