//! Wallet data model and feature extraction
//!
//! ```text
//! WalletRequest → FeatureVector   (classifier input)
//!              → ActivityProfile  (descriptions, API output)
//! ```

pub mod activity;
pub mod features;
pub mod types;

pub use activity::{ActivityHints, ActivityProfile};
pub use features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
pub use types::{normalize_address, validate_address, WalletArchetype, WalletRequest, WalletTransaction};
