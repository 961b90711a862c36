//! Feature extraction from raw transaction logs
//!
//! Turns a wallet's history into the fixed 15-dimensional vector the
//! classifier was trained on. The order of [`FEATURE_NAMES`] is part of the
//! model contract and must not change.

use serde::Serialize;
use std::collections::HashSet;
use tracing::debug;

use crate::error::{Error, Result};
use crate::wallet::types::{validate_address, WalletTransaction};

/// Number of features per wallet
pub const FEATURE_COUNT: usize = 15;

/// Feature names in model order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "transaction_count",
    "mean_value",
    "total_value",
    "value_std",
    "min_value",
    "max_value",
    "value_range",
    "value_std_norm",
    "unique_methods",
    "transaction_duration",
    "avg_transaction_interval",
    "transaction_intensity",
    "address_length",
    "address_prefix",
    "address_suffix",
];

/// Below this magnitude the mean is treated as zero for normalization
const MEAN_EPSILON: f64 = 1e-8;

/// Feature vector for one wallet
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Extract features from a wallet's transaction history
    pub fn extract(address: &str, transactions: &[WalletTransaction]) -> Result<Self> {
        validate_address(address)?;
        if transactions.is_empty() {
            return Err(Error::EmptyHistory(address.to_string()));
        }

        let count = transactions.len() as f64;

        let total_value: f64 = transactions.iter().map(|tx| tx.value).sum();
        let mean_value = total_value / count;
        let min_value = transactions
            .iter()
            .map(|tx| tx.value)
            .fold(f64::INFINITY, f64::min);
        let max_value = transactions
            .iter()
            .map(|tx| tx.value)
            .fold(f64::NEG_INFINITY, f64::max);

        // Sample std (ddof = 1); a single transaction has no spread
        let value_std = if transactions.len() > 1 {
            let ss: f64 = transactions
                .iter()
                .map(|tx| (tx.value - mean_value).powi(2))
                .sum();
            (ss / (count - 1.0)).sqrt()
        } else {
            0.0
        };

        let value_range = max_value - min_value;
        let value_std_norm = if mean_value.abs() > MEAN_EPSILON {
            value_std / mean_value
        } else {
            0.0
        };

        let unique_methods = transactions
            .iter()
            .map(|tx| tx.method.as_str())
            .collect::<HashSet<_>>()
            .len() as f64;

        let first = transactions.iter().map(|tx| tx.timestamp).min().unwrap_or(0);
        let last = transactions.iter().map(|tx| tx.timestamp).max().unwrap_or(0);
        let transaction_duration = last.abs_diff(first) as f64;
        let avg_transaction_interval = transaction_duration / count;
        let transaction_intensity = if transaction_duration > 0.0 {
            count / transaction_duration
        } else {
            0.0
        };

        let (address_prefix, address_suffix) = address_digits(address)?;

        let values = [
            count,
            mean_value,
            total_value,
            value_std,
            min_value,
            max_value,
            value_range,
            value_std_norm,
            unique_methods,
            transaction_duration,
            avg_transaction_interval,
            transaction_intensity,
            address.chars().count() as f64,
            address_prefix,
            address_suffix,
        ];

        debug!(address = %address, transactions = transactions.len(), "Extracted features");

        Ok(Self { values })
    }

    /// Build from raw values (already in model order)
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Get a feature by name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.values[i])
    }

    /// Feature `(name, value)` pairs in model order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        FEATURE_NAMES.iter().copied().zip(self.values.iter().copied())
    }
}

/// Hex digits right after `0x` and the last four, parsed base 16
fn address_digits(address: &str) -> Result<(f64, f64)> {
    let prefix = address
        .get(2..4)
        .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;
    let suffix = address
        .get(address.len().saturating_sub(4)..)
        .ok_or_else(|| Error::InvalidAddress(address.to_string()))?;

    let prefix = u8::from_str_radix(prefix, 16)
        .map_err(|_| Error::InvalidAddress(address.to_string()))?;
    let suffix = u16::from_str_radix(suffix, 16)
        .map_err(|_| Error::InvalidAddress(address.to_string()))?;

    Ok((prefix as f64, suffix as f64))
}
