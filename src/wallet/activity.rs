//! Activity profile - descriptive statistics of a wallet's history
//!
//! Complements the model features with counterparty, timing and method
//! statistics. The similarity index describes wallets from this profile and
//! the API returns it alongside each classification.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::wallet::types::WalletTransaction;

/// ERC-721 `transferFrom(address,address,uint256)` selector
pub const TRANSFER_FROM_SELECTOR: &str = "0x23b872dd";

/// `mint(uint256)` selector
pub const MINT_SELECTOR: &str = "0xa0712d68";

/// Activity above this count with many counterparties looks like airdrop farming
const BURST_TX_THRESHOLD: usize = 20;
const BURST_COUNTERPARTY_THRESHOLD: usize = 10;

/// Transaction count range for an ordinary wallet
const MODERATE_MIN_TX: usize = 10;
const MODERATE_MAX_TX: usize = 100;

/// Heuristic behavior flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityHints {
    /// Many transactions spread over many contracts
    pub bursty_multi_contract: bool,
    /// Moderate transaction count
    pub moderate_activity: bool,
}

/// Descriptive statistics of a wallet's activity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityProfile {
    pub transaction_count: usize,
    pub unique_counterparties: usize,
    pub average_value: f64,
    /// Method → count, most frequent first
    pub method_counts: Vec<(String, usize)>,
    pub avg_time_between_tx: f64,
    pub std_time_between_tx: f64,
    pub nft_operations: usize,
    pub first_seen: Option<DateTime<Utc>>,
    pub last_seen: Option<DateTime<Utc>>,
    pub hints: ActivityHints,
}

impl ActivityProfile {
    /// Compute the profile of a transaction history
    pub fn from_transactions(transactions: &[WalletTransaction]) -> Self {
        let transaction_count = transactions.len();
        if transaction_count == 0 {
            return Self::default();
        }

        let unique_counterparties = transactions
            .iter()
            .filter_map(|tx| tx.to.as_deref())
            .filter(|to| !to.is_empty())
            .collect::<HashSet<_>>()
            .len();

        let average_value =
            transactions.iter().map(|tx| tx.value).sum::<f64>() / transaction_count as f64;

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for tx in transactions {
            *counts.entry(tx.method.as_str()).or_default() += 1;
        }
        let mut method_counts: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(method, count)| (method.to_string(), count))
            .collect();
        method_counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut timestamps: Vec<i64> = transactions.iter().map(|tx| tx.timestamp).collect();
        timestamps.sort_unstable();
        let gaps: Vec<f64> = timestamps
            .windows(2)
            .map(|w| w[1].abs_diff(w[0]) as f64)
            .collect();
        let (avg_time_between_tx, std_time_between_tx) = mean_and_population_std(&gaps);

        let nft_operations = transactions
            .iter()
            .filter(|tx| is_nft_method(&tx.method))
            .count();

        let first_seen = timestamps
            .first()
            .and_then(|ts| DateTime::from_timestamp(*ts, 0));
        let last_seen = timestamps
            .last()
            .and_then(|ts| DateTime::from_timestamp(*ts, 0));

        let hints = ActivityHints {
            bursty_multi_contract: transaction_count > BURST_TX_THRESHOLD
                && unique_counterparties > BURST_COUNTERPARTY_THRESHOLD,
            moderate_activity: (MODERATE_MIN_TX..=MODERATE_MAX_TX).contains(&transaction_count),
        };

        Self {
            transaction_count,
            unique_counterparties,
            average_value,
            method_counts,
            avg_time_between_tx,
            std_time_between_tx,
            nft_operations,
            first_seen,
            last_seen,
            hints,
        }
    }

    /// Share of transactions that are NFT operations
    pub fn nft_ratio(&self) -> f64 {
        if self.transaction_count == 0 {
            0.0
        } else {
            self.nft_operations as f64 / self.transaction_count as f64
        }
    }
}

/// Whether a method label or selector denotes an NFT mint/trade/transfer
pub fn is_nft_method(method: &str) -> bool {
    let method = method.to_ascii_lowercase();
    matches!(method.as_str(), "mint" | "buy" | "sell")
        || method.starts_with(TRANSFER_FROM_SELECTOR)
        || method.starts_with(MINT_SELECTOR)
}

fn mean_and_population_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}
