//! Club service: the read/compute/write cycle behind every interaction.
//!
//! Each call reloads the collections from the store; nothing derived is
//! cached between calls. New records are validated here before they are
//! appended, and purchases are refused when the pool cannot pay for them.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::accountant::{Accountant, ClubReport};
use super::accounting::{available_cash, pooled_holdings};
use crate::export::{self, ExportKind};
use crate::prices::PriceService;
use crate::storage::RecordStore;
use crate::types::{
    Asset, ClubError, ContributionRecord, HoldingsSnapshot, Member, TransactionRecord,
    MAX_AMOUNT_AUD,
};

/// A purchase as entered by a member.
#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub asset: Asset,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    #[serde(default)]
    pub fee: Decimal,
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl PurchaseRequest {
    fn validate(&self) -> Result<(), ClubError> {
        if self.quantity <= Decimal::ZERO {
            return Err(ClubError::InvalidInput("Quantity must be greater than 0".into()));
        }
        if self.unit_price <= Decimal::ZERO {
            return Err(ClubError::InvalidInput("Unit price must be greater than 0".into()));
        }
        if self.fee < Decimal::ZERO {
            return Err(ClubError::InvalidInput("Fee cannot be negative".into()));
        }
        Ok(())
    }

    fn into_record(self) -> Result<TransactionRecord, ClubError> {
        let mut record = TransactionRecord::buy(self.asset, self.quantity, self.unit_price, self.fee);
        record.date = self.date;
        record.notes = self.notes.filter(|n| !n.trim().is_empty());
        record.check_bounds().map_err(ClubError::InvalidInput)?;
        Ok(record)
    }
}

/// Wires the record store and the price service together.
#[derive(Clone)]
pub struct Club {
    name: String,
    store: Arc<dyn RecordStore>,
    prices: PriceService,
    /// Held across the cash check and the append in `record_purchase`.
    purchase_lock: Arc<Mutex<()>>,
}

impl Club {
    pub fn new(name: impl Into<String>, store: Arc<dyn RecordStore>, prices: PriceService) -> Self {
        Self {
            name: name.into(),
            store,
            prices,
            purchase_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Record one contribution.
    pub fn record_contribution(
        &self,
        member: Member,
        amount: Decimal,
        date: Option<NaiveDate>,
    ) -> Result<ContributionRecord> {
        check_contribution(amount)?;
        let record = ContributionRecord::new(member, amount, date);
        self.store.append_contribution(&record)?;
        info!(%member, amount = %record.amount, "Contribution recorded");
        Ok(record)
    }

    /// Record the same contribution for every member in one write: either
    /// the whole round is stored or none of it is.
    pub fn record_weekly_round(
        &self,
        amount: Decimal,
        date: Option<NaiveDate>,
    ) -> Result<Vec<ContributionRecord>> {
        check_contribution(amount)?;
        let records: Vec<ContributionRecord> = Member::ALL
            .iter()
            .map(|&member| ContributionRecord::new(member, amount, date))
            .collect();
        self.store.append_contributions(&records)?;
        info!(members = records.len(), %amount, "Weekly round recorded");
        Ok(records)
    }

    /// Record a purchase paid from pooled cash.
    ///
    /// The cash check and the append run under one lock, so concurrent
    /// purchases through the same `Club` (or its clones) cannot both spend
    /// the same cash. Separate processes writing the same data directory
    /// are not coordinated.
    pub fn record_purchase(&self, request: PurchaseRequest) -> Result<TransactionRecord> {
        request.validate()?;
        let record = request.into_record()?;

        let _guard = self
            .purchase_lock
            .lock()
            .map_err(|_| ClubError::Storage("purchase lock poisoned".into()))?;

        let contributions = self.store.load_contributions()?;
        let transactions = self.store.load_transactions()?;
        let available = available_cash(&contributions.records, &transactions.records);

        let needed = record.cost_basis();
        if needed > available {
            warn!(%needed, %available, asset = %record.asset, "Purchase refused");
            return Err(ClubError::InsufficientCash { needed, available }.into());
        }

        self.store.append_transaction(&record)?;
        info!(
            asset = %record.asset,
            quantity = %record.quantity,
            cost = format!("${:.2}", needed),
            "Purchase recorded"
        );

        let mut history = transactions.records;
        history.push(record.clone());
        if let Err(e) = self
            .store
            .save_holdings_snapshot(&HoldingsSnapshot::new(pooled_holdings(&history)))
        {
            warn!(error = %e, "Failed to refresh holdings snapshot");
        }

        Ok(record)
    }

    pub fn contributions(&self) -> Result<Vec<ContributionRecord>> {
        Ok(self.store.load_contributions()?.records)
    }

    pub fn transactions(&self) -> Result<Vec<TransactionRecord>> {
        Ok(self.store.load_transactions()?.records)
    }

    /// Render one table as CSV from freshly loaded records.
    pub fn export_csv(&self, kind: ExportKind) -> Result<String> {
        let csv = match kind {
            ExportKind::Contributions => export::contributions_csv(&self.contributions()?)?,
            ExportKind::Transactions => export::transactions_csv(&self.transactions()?)?,
            ExportKind::Holdings => export::holdings_csv(&pooled_holdings(&self.transactions()?))?,
        };
        info!(%kind, bytes = csv.len(), "CSV export rendered");
        Ok(csv)
    }

    /// Load everything fresh, fetch live prices and reconcile.
    pub async fn report(&self, now: DateTime<Utc>) -> Result<ClubReport> {
        let contributions = self.store.load_contributions()?;
        let transactions = self.store.load_transactions()?;
        let prices = self.prices.fetch_all().await;
        Ok(Accountant::summarize(
            &self.name,
            &contributions,
            &transactions,
            &prices,
            now,
        ))
    }
}

fn check_contribution(amount: Decimal) -> Result<(), ClubError> {
    if amount <= Decimal::ZERO {
        return Err(ClubError::InvalidInput("Contribution must be greater than 0".into()));
    }
    if amount > MAX_AMOUNT_AUD {
        return Err(ClubError::InvalidInput(format!(
            "Contribution must not exceed {MAX_AMOUNT_AUD}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
