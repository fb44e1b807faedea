//! JSON-file record store.
//!
//! Each collection is one pretty-printed JSON file in the configured data
//! directory. Appends rewrite the whole file through a temp file and a
//! rename so a crash mid-write leaves the previous version intact.
//!
//! The pre-flat contributions layout, `{"<member>": [{amount, date,
//! timestamp}, ...]}`, is still readable; the first append rewrites it as
//! a flat array with the member folded into each record.

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{decode_records, Loaded, RecordStore};
use crate::types::{ClubError, Collection, ContributionRecord, HoldingsSnapshot, TransactionRecord};

pub struct JsonFileStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open a store rooted at `data_dir`, creating the directory if needed.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {}", data_dir.display()))?;
        info!(path = %data_dir.display(), "Record store opened");
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }

    /// Raw elements of a record collection. A missing file is empty.
    fn read_raw(&self, collection: Collection) -> Result<Vec<Value>> {
        let path = self.path(collection);
        if !path.exists() {
            debug!(path = %path.display(), "No collection file yet");
            return Ok(Vec::new());
        }

        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if json.trim().is_empty() {
            return Ok(Vec::new());
        }
        let value: Value = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse {}", path.display()))?;

        match (collection, value) {
            (_, Value::Array(items)) => Ok(items),
            (Collection::Contributions, Value::Object(by_member)) => {
                Ok(flatten_member_layout(by_member))
            }
            (_, other) => Err(anyhow!(
                "{} must hold a JSON array, found {}",
                path.display(),
                json_kind(&other)
            )),
        }
    }

    fn append_raw<T: Serialize>(&self, collection: Collection, records: &[T]) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ClubError::Storage("record store lock poisoned".into()))?;

        let mut items = self.read_raw(collection)?;
        for record in records {
            items.push(serde_json::to_value(record).context("Failed to serialise record")?);
        }
        self.write_atomic(collection, &Value::Array(items))?;

        debug!(%collection, count = records.len(), "Records appended");
        Ok(())
    }

    fn write_atomic(&self, collection: Collection, value: &Value) -> Result<()> {
        let path = self.path(collection);
        let tmp = self
            .data_dir
            .join(format!(".{}.{}.tmp", collection.file_name(), Uuid::new_v4()));

        let json = serde_json::to_string_pretty(value).context("Failed to serialise collection")?;
        fs::write(&tmp, json).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace {}", path.display()))?;
        Ok(())
    }
}

/// `{"Charles": [{...}], ...}` → `[{"member": "Charles", ...}, ...]`
fn flatten_member_layout(by_member: serde_json::Map<String, Value>) -> Vec<Value> {
    let mut items = Vec::new();
    for (member, records) in by_member {
        match records {
            Value::Array(records) => {
                for mut record in records {
                    if let Value::Object(fields) = &mut record {
                        fields
                            .entry("member")
                            .or_insert_with(|| Value::String(member.clone()));
                    }
                    items.push(record);
                }
            }
            other => {
                // Kept as-is so the decode step reports it rather than dropping it.
                items.push(other);
            }
        }
    }
    items
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

impl RecordStore for JsonFileStore {
    fn load_contributions(&self) -> Result<Loaded<ContributionRecord>> {
        let raw = self.read_raw(Collection::Contributions)?;
        Ok(decode_records(&raw))
    }

    fn load_transactions(&self) -> Result<Loaded<TransactionRecord>> {
        let raw = self.read_raw(Collection::Transactions)?;
        Ok(decode_records(&raw))
    }

    fn append_contribution(&self, record: &ContributionRecord) -> Result<()> {
        self.append_raw(Collection::Contributions, std::slice::from_ref(record))
    }

    fn append_contributions(&self, records: &[ContributionRecord]) -> Result<()> {
        self.append_raw(Collection::Contributions, records)
    }

    fn append_transaction(&self, record: &TransactionRecord) -> Result<()> {
        self.append_raw(Collection::Transactions, std::slice::from_ref(record))
    }

    fn save_holdings_snapshot(&self, snapshot: &HoldingsSnapshot) -> Result<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| ClubError::Storage("record store lock poisoned".into()))?;
        let value = serde_json::to_value(snapshot).context("Failed to serialise holdings snapshot")?;
        self.write_atomic(Collection::Holdings, &value)
    }

    fn load_holdings_snapshot(&self) -> Result<Option<HoldingsSnapshot>> {
        let path = self.path(Collection::Holdings);
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        match serde_json::from_str(&json) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable holdings snapshot");
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
