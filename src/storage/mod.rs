//! Persistence layer.
//!
//! Defines the `RecordStore` trait over the three append-only collections
//! (contributions, transactions, cached holdings snapshot) and the shared
//! decoding step that turns raw JSON elements into validated records.
//! Malformed elements are skipped with a warning and reported back to the
//! caller instead of being folded into any total.

pub mod json_file;
pub mod memory;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;

use anyhow::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::types::{ClubError, Collection, ContributionRecord, HoldingsSnapshot, TransactionRecord};

// ---------------------------------------------------------------------------
// Loaded records
// ---------------------------------------------------------------------------

/// A stored element that failed to decode or validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position in the stored collection.
    pub index: usize,
    pub reason: String,
}

/// Result of loading one collection: accepted records in stored order plus
/// everything that was skipped.
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

impl<T> Default for Loaded<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Loaded<T> {
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Record trait
// ---------------------------------------------------------------------------

/// A persisted, append-only record kind.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync {
    const COLLECTION: Collection;

    fn validate(&self) -> Result<(), ClubError>;
}

impl Record for ContributionRecord {
    const COLLECTION: Collection = Collection::Contributions;

    fn validate(&self) -> Result<(), ClubError> {
        ContributionRecord::validate(self)
    }
}

impl Record for TransactionRecord {
    const COLLECTION: Collection = Collection::Transactions;

    fn validate(&self) -> Result<(), ClubError> {
        TransactionRecord::validate(self)
    }
}

/// Decode raw JSON elements into records, skipping anything malformed.
pub fn decode_records<T: Record>(raw: &[Value]) -> Loaded<T> {
    let mut loaded = Loaded::default();
    for (index, value) in raw.iter().enumerate() {
        let decoded = serde_json::from_value::<T>(value.clone())
            .map_err(|e| ClubError::MalformedRecord(e.to_string()))
            .and_then(|record| record.validate().map(|_| record));

        match decoded {
            Ok(record) => loaded.records.push(record),
            Err(e) => {
                warn!(
                    collection = %T::COLLECTION,
                    index,
                    error = %e,
                    "Skipping malformed record"
                );
                loaded.rejected.push(RejectedRecord {
                    index,
                    reason: e.to_string(),
                });
            }
        }
    }
    loaded
}

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

/// Repository over the club's record collections.
///
/// Appends must preserve every previously stored element, including ones
/// that fail to decode.
pub trait RecordStore: Send + Sync {
    fn load_contributions(&self) -> Result<Loaded<ContributionRecord>>;

    fn load_transactions(&self) -> Result<Loaded<TransactionRecord>>;

    fn append_contribution(&self, record: &ContributionRecord) -> Result<()>;

    /// Append several contributions as one write. On error nothing from
    /// `records` is stored.
    fn append_contributions(&self, records: &[ContributionRecord]) -> Result<()>;

    fn append_transaction(&self, record: &TransactionRecord) -> Result<()>;

    /// Overwrite the cached holdings snapshot.
    fn save_holdings_snapshot(&self, snapshot: &HoldingsSnapshot) -> Result<()>;

    /// The cached snapshot, if one exists and is readable.
    fn load_holdings_snapshot(&self) -> Result<Option<HoldingsSnapshot>>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
