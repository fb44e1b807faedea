//! CSV backup export of the record collections and the derived holdings.

use anyhow::{anyhow, Context, Result};
use csv::Writer;
use std::fmt;
use std::str::FromStr;

use crate::types::{ClubError, ContributionRecord, Holdings, TransactionRecord};

/// One exportable table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Contributions,
    Transactions,
    Holdings,
}

impl ExportKind {
    pub const ALL: [ExportKind; 3] = [
        ExportKind::Contributions,
        ExportKind::Transactions,
        ExportKind::Holdings,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            ExportKind::Contributions => "contributions.csv",
            ExportKind::Transactions => "transactions.csv",
            ExportKind::Holdings => "holdings.csv",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.file_name().trim_end_matches(".csv");
        write!(f, "{name}")
    }
}

/// Accepts the bare name or the file name: `holdings` or `holdings.csv`.
impl FromStr for ExportKind {
    type Err = ClubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        let wanted = wanted.strip_suffix(".csv").unwrap_or(&wanted);
        ExportKind::ALL
            .into_iter()
            .find(|kind| kind.to_string() == wanted)
            .ok_or_else(|| ClubError::InvalidInput(format!("Unknown export: {s}")))
    }
}

pub fn contributions_csv(records: &[ContributionRecord]) -> Result<String> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(["member", "amount", "date", "timestamp"])?;
    for r in records {
        wtr.write_record([
            r.member.name().to_string(),
            r.amount.to_string(),
            r.effective_date().to_string(),
            r.timestamp.to_rfc3339(),
        ])?;
    }
    finish(wtr)
}

pub fn transactions_csv(records: &[TransactionRecord]) -> Result<String> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record([
        "date",
        "asset",
        "side",
        "quantity",
        "unit_price",
        "fee",
        "cost_basis",
        "timestamp",
        "notes",
    ])?;
    for r in records {
        wtr.write_record([
            r.effective_date().to_string(),
            r.asset.to_string(),
            r.side.to_string(),
            r.quantity.to_string(),
            r.unit_price.to_string(),
            r.fee.to_string(),
            r.cost_basis().to_string(),
            r.timestamp.to_rfc3339(),
            r.notes.clone().unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

/// Average cost is left empty for a position with zero quantity.
pub fn holdings_csv(holdings: &Holdings) -> Result<String> {
    let mut wtr = Writer::from_writer(Vec::new());
    wtr.write_record(["asset", "quantity", "cost_basis", "average_cost"])?;
    for (asset, h) in holdings {
        wtr.write_record([
            asset.to_string(),
            h.quantity.to_string(),
            h.cost_basis.to_string(),
            h.average_cost()
                .map(|c| c.round_dp(2).to_string())
                .unwrap_or_default(),
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: Writer<Vec<u8>>) -> Result<String> {
    let bytes = wtr
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV: {}", e.error()))?;
    String::from_utf8(bytes).context("CSV output is not UTF-8")
}
