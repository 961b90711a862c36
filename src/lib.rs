//! Wallet Analyzer Library
//!
//! Wallet archetype classification with a nearest-neighbor similarity
//! fallback for low-confidence predictions.

pub mod analyzer;
pub mod api;
pub mod cache;
pub mod cli;
pub mod client;
pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod similarity;
pub mod wallet;

// Re-export commonly used types
pub use analyzer::{ClassificationResult, DecisionSource, WalletAnalyzer};
pub use config::Config;
pub use error::{Error, Result};
