//! Labeled transaction dataset
//!
//! Loads the collector's CSV export (`address,label,timestamp,to,value,method`,
//! one row per transaction) and groups it into per-wallet records. The
//! similarity index is built from these records.
//!
//! Addresses are lowercased on the way in. When rows for one address carry
//! different labels, the first label seen is kept.

use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::wallet::{normalize_address, WalletTransaction};

/// Columns that must be present in the CSV header
const REQUIRED_COLUMNS: [&str; 4] = ["address", "label", "timestamp", "value"];

/// One labeled wallet with its transactions
#[derive(Debug, Clone, PartialEq)]
pub struct WalletRecord {
    pub address: String,
    pub label: String,
    pub transactions: Vec<WalletTransaction>,
}

impl WalletRecord {
    pub fn new(
        address: impl Into<String>,
        label: impl Into<String>,
        transactions: Vec<WalletTransaction>,
    ) -> Self {
        let address: String = address.into();
        Self {
            address: normalize_address(&address),
            label: label.into(),
            transactions,
        }
    }
}

/// Raw CSV row before validation
#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
    #[serde(default)]
    to: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    method: Option<String>,
}

/// Labeled wallets, ordered by address
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<WalletRecord>,
    /// SHA-256 of the source file, when loaded from disk
    digest: Option<String>,
}

/// Hex SHA-256 of a dataset file, as recorded by [`Dataset::load`]
pub fn file_digest<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|e| Error::Dataset(format!("{}: {}", path.display(), e)))?;
    Ok(hex_digest(&bytes))
}

fn hex_digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

impl Dataset {
    /// Load and group a labeled CSV file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| Error::Dataset(format!("{}: {}", path.display(), e)))?;
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(bytes.as_slice());

        let headers = reader.headers()?.clone();
        for column in REQUIRED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                return Err(Error::Dataset(format!(
                    "{}: missing column '{}'",
                    path.display(),
                    column
                )));
            }
        }

        let mut grouped: BTreeMap<String, WalletRecord> = BTreeMap::new();
        let mut rows = 0usize;
        let mut dropped = 0usize;
        let mut conflicts = 0usize;

        for row in reader.deserialize::<RawRow>() {
            let row = row?;
            rows += 1;

            let Some((address, label, tx)) = parse_row(row) else {
                dropped += 1;
                continue;
            };

            let record = grouped
                .entry(address.clone())
                .or_insert_with(|| WalletRecord::new(address, label.clone(), Vec::new()));
            if record.label != label {
                conflicts += 1;
            }
            record.transactions.push(tx);
        }

        if conflicts > 0 {
            warn!(
                path = %path.display(),
                conflicts,
                "Rows disagree with the first label seen for their wallet; first label kept"
            );
        }

        if dropped > 0 {
            warn!(
                path = %path.display(),
                dropped,
                rows,
                "Dropped rows with missing address/label or unparsable timestamp/value"
            );
        }

        let dataset = Self {
            records: grouped.into_values().collect(),
            digest: Some(hex_digest(&bytes)),
        };

        info!(
            path = %path.display(),
            rows,
            wallets = dataset.len(),
            labels = ?dataset.labels(),
            "Loaded labeled dataset"
        );

        Ok(dataset)
    }

    /// Build from records; records are re-ordered by address and merged
    /// when the same address appears twice
    pub fn from_records(records: Vec<WalletRecord>) -> Self {
        let mut grouped: BTreeMap<String, WalletRecord> = BTreeMap::new();
        for mut record in records {
            record.address = normalize_address(&record.address);
            match grouped.get_mut(&record.address) {
                Some(existing) => existing.transactions.extend(record.transactions),
                None => {
                    grouped.insert(record.address.clone(), record);
                }
            }
        }
        Self {
            records: grouped.into_values().collect(),
            digest: None,
        }
    }

    pub fn records(&self) -> &[WalletRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// Look up a wallet by address, in any letter case
    pub fn get(&self, address: &str) -> Option<&WalletRecord> {
        let address = normalize_address(address);
        self.records
            .binary_search_by(|r| r.address.as_str().cmp(address.as_str()))
            .ok()
            .map(|i| &self.records[i])
    }

    /// Distinct labels, sorted
    pub fn labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.records.iter().map(|r| r.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }
}

fn parse_row(row: RawRow) -> Option<(String, String, WalletTransaction)> {
    let address = normalize_address(&non_empty(row.address)?);
    let label = non_empty(row.label)?;
    let timestamp = parse_timestamp(row.timestamp.as_deref()?)?;
    let value: f64 = row.value.as_deref()?.parse().ok()?;
    if !value.is_finite() {
        return None;
    }

    let tx = WalletTransaction {
        timestamp,
        value,
        method: row.method.unwrap_or_default(),
        to: non_empty(row.to),
    };
    Some((address, label, tx))
}

/// Unix seconds, integral or fractional
fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(ts) = raw.parse::<i64>() {
        return Some(ts);
    }
    let ts: f64 = raw.parse().ok()?;
    ts.is_finite().then(|| ts.trunc() as i64)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
