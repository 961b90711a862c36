//! Core types for wallet analysis
//!
//! Defines the transaction records submitted for analysis, the request
//! envelope and the known wallet archetypes.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

lazy_static::lazy_static! {
    /// EVM address: `0x` followed by 40 hex digits
    static ref ADDRESS_RE: Regex =
        Regex::new("^0x[0-9a-fA-F]{40}$").expect("Invalid address regex");
}

/// A single transaction in a wallet's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTransaction {
    /// Block timestamp (unix seconds)
    pub timestamp: i64,

    /// Transferred value in ETH
    #[serde(default)]
    pub value: f64,

    /// Method label or 4-byte selector ("transfer", "mint", "0xa0712d68")
    #[serde(default)]
    pub method: String,

    /// Counterparty (recipient or contract)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl WalletTransaction {
    pub fn new(timestamp: i64, value: f64, method: impl Into<String>) -> Self {
        Self {
            timestamp,
            value,
            method: method.into(),
            to: None,
        }
    }

    /// Set the counterparty address
    pub fn with_to(mut self, to: impl Into<String>) -> Self {
        self.to = Some(to.into());
        self
    }
}

/// Analysis request: a wallet address and its transaction history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletRequest {
    pub address: String,
    #[serde(default)]
    pub transactions: Vec<WalletTransaction>,
}

impl WalletRequest {
    pub fn new(address: impl Into<String>, transactions: Vec<WalletTransaction>) -> Self {
        Self {
            address: address.into(),
            transactions,
        }
    }

    /// Validate the address and require a non-empty history
    pub fn validate(&self) -> Result<()> {
        validate_address(&self.address)?;
        if self.transactions.is_empty() {
            return Err(Error::EmptyHistory(self.address.clone()));
        }
        Ok(())
    }
}

/// Check that `address` is a well-formed EVM address
pub fn validate_address(address: &str) -> Result<()> {
    if ADDRESS_RE.is_match(address) {
        Ok(())
    } else {
        Err(Error::InvalidAddress(address.to_string()))
    }
}

/// Canonical form used for address identity: hex digits are
/// case-insensitive, so `0xAbC...` and `0xabc...` are the same wallet
pub fn normalize_address(address: &str) -> String {
    address.to_ascii_lowercase()
}

/// Known wallet archetypes
///
/// Labels come from the trained model, so anything it was trained on
/// round-trips through `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WalletArchetype {
    /// Farms airdrops: bursts of activity across many new contracts
    DropHunter,
    /// Mints and trades NFTs
    NftCollector,
    /// Ordinary transfers at a moderate pace
    RegularUser,
    /// Any other label present in the model or dataset
    Other(String),
}

impl WalletArchetype {
    /// Label as used in the dataset and model
    pub fn label(&self) -> &str {
        match self {
            WalletArchetype::DropHunter => "drop_hunter",
            WalletArchetype::NftCollector => "nft_collector",
            WalletArchetype::RegularUser => "regular_user",
            WalletArchetype::Other(label) => label,
        }
    }

    /// Human-readable name for terminal output
    pub fn human_name(&self) -> String {
        match self {
            WalletArchetype::DropHunter => "Drop hunter".to_string(),
            WalletArchetype::NftCollector => "NFT collector".to_string(),
            WalletArchetype::RegularUser => "Regular user".to_string(),
            WalletArchetype::Other(label) => label.replace('_', " "),
        }
    }
}

impl FromStr for WalletArchetype {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from(s))
    }
}

impl From<&str> for WalletArchetype {
    fn from(label: &str) -> Self {
        match label {
            "drop_hunter" => WalletArchetype::DropHunter,
            "nft_collector" => WalletArchetype::NftCollector,
            "regular_user" => WalletArchetype::RegularUser,
            other => WalletArchetype::Other(other.to_string()),
        }
    }
}

impl fmt::Display for WalletArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
