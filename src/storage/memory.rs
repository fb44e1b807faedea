//! In-memory record store for tests and dry runs.
//!
//! Holds raw JSON elements exactly like the file store does, so decoding
//! and rejection behave identically.

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Mutex;

use super::{decode_records, Loaded, RecordStore};
use crate::types::{ClubError, Collection, ContributionRecord, HoldingsSnapshot, TransactionRecord};

#[derive(Default)]
pub struct MemoryStore {
    contributions: Mutex<Vec<Value>>,
    transactions: Mutex<Vec<Value>>,
    snapshot: Mutex<Option<HoldingsSnapshot>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push an arbitrary element, bypassing record serialisation.
    pub fn push_raw(&self, collection: Collection, value: Value) -> Result<()> {
        match collection {
            Collection::Contributions => lock(&self.contributions)?.push(value),
            Collection::Transactions => lock(&self.transactions)?.push(value),
            Collection::Holdings => {
                *lock(&self.snapshot)? = Some(
                    serde_json::from_value(value).context("Invalid holdings snapshot")?,
                );
            }
        }
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<std::sync::MutexGuard<'_, T>> {
    m.lock()
        .map_err(|_| anyhow::Error::from(ClubError::Storage("memory store lock poisoned".into())))
}

impl RecordStore for MemoryStore {
    fn load_contributions(&self) -> Result<Loaded<ContributionRecord>> {
        Ok(decode_records(&lock(&self.contributions)?))
    }

    fn load_transactions(&self) -> Result<Loaded<TransactionRecord>> {
        Ok(decode_records(&lock(&self.transactions)?))
    }

    fn append_contribution(&self, record: &ContributionRecord) -> Result<()> {
        let value = serde_json::to_value(record).context("Failed to serialise contribution")?;
        lock(&self.contributions)?.push(value);
        Ok(())
    }

    fn append_contributions(&self, records: &[ContributionRecord]) -> Result<()> {
        let values = records
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to serialise contributions")?;
        lock(&self.contributions)?.extend(values);
        Ok(())
    }

    fn append_transaction(&self, record: &TransactionRecord) -> Result<()> {
        let value = serde_json::to_value(record).context("Failed to serialise transaction")?;
        lock(&self.transactions)?.push(value);
        Ok(())
    }

    fn save_holdings_snapshot(&self, snapshot: &HoldingsSnapshot) -> Result<()> {
        *lock(&self.snapshot)? = Some(snapshot.clone());
        Ok(())
    }

    fn load_holdings_snapshot(&self) -> Result<Option<HoldingsSnapshot>> {
        Ok(lock(&self.snapshot)?.clone())
    }
}
