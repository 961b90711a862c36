//! Wallet analyzer - classifier with a similarity fallback
//!
//! The classifier answers first. When its confidence falls below the
//! configured threshold, the label of the nearest known wallet is used
//! instead and the confidence is pinned to the threshold.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

use crate::config::DecisionConfig;
use crate::error::Result;
use crate::model::ModelBundle;
use crate::similarity::{SimilarWallet, WalletSimilarity};
use crate::wallet::{ActivityProfile, FeatureVector, WalletRequest};

/// Which stage produced the final label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    Classifier,
    Similarity,
}

impl fmt::Display for DecisionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionSource::Classifier => write!(f, "classifier"),
            DecisionSource::Similarity => write!(f, "similarity"),
        }
    }
}

/// Result of analyzing one wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub predicted_class: String,
    pub confidence: f64,
    pub source: DecisionSource,
    /// Neighbors consulted by the fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similar_wallets: Option<Vec<SimilarWallet>>,
    pub activity: ActivityProfile,
}

/// Runs the full analysis pipeline for a request
pub struct WalletAnalyzer {
    model: ModelBundle,
    similarity: WalletSimilarity,
    decision: DecisionConfig,
}

impl WalletAnalyzer {
    pub fn new(model: ModelBundle, similarity: WalletSimilarity, decision: DecisionConfig) -> Self {
        Self {
            model,
            similarity,
            decision,
        }
    }

    pub fn classes(&self) -> &[String] {
        self.model.classes()
    }

    pub fn indexed_wallets(&self) -> usize {
        self.similarity.len()
    }

    pub fn similarity(&self) -> &WalletSimilarity {
        &self.similarity
    }

    pub fn decision(&self) -> &DecisionConfig {
        &self.decision
    }

    /// Classify a wallet, falling back to its nearest neighbors when unsure
    pub fn analyze(&self, request: &WalletRequest) -> Result<ClassificationResult> {
        request.validate()?;

        let features = FeatureVector::extract(&request.address, &request.transactions)?;
        let prediction = self.model.predict(&features)?;
        let activity = ActivityProfile::from_transactions(&request.transactions);

        debug!(
            address = %request.address,
            label = %prediction.label,
            confidence = prediction.confidence,
            "Classifier prediction"
        );

        let threshold = self.decision.confidence_threshold;
        if prediction.confidence >= threshold {
            info!(
                address = %request.address,
                class = %prediction.label,
                confidence = prediction.confidence,
                source = %DecisionSource::Classifier,
                "Wallet analyzed"
            );
            return Ok(ClassificationResult {
                predicted_class: prediction.label,
                confidence: prediction.confidence,
                source: DecisionSource::Classifier,
                similar_wallets: None,
                activity,
            });
        }

        let similar = self.find_neighbors(request)?;
        let attached = self.decision.attach_similar.then(|| similar.clone());

        let result = match similar.first() {
            Some(nearest) => ClassificationResult {
                predicted_class: nearest.label.clone(),
                confidence: threshold,
                source: DecisionSource::Similarity,
                similar_wallets: attached,
                activity,
            },
            None => {
                warn!(
                    address = %request.address,
                    confidence = prediction.confidence,
                    threshold,
                    "Low confidence and no similar wallets found, keeping classifier label"
                );
                ClassificationResult {
                    predicted_class: prediction.label,
                    confidence: prediction.confidence,
                    source: DecisionSource::Classifier,
                    similar_wallets: attached,
                    activity,
                }
            }
        };

        info!(
            address = %request.address,
            class = %result.predicted_class,
            confidence = result.confidence,
            source = %result.source,
            classifier_confidence = prediction.confidence,
            "Wallet analyzed"
        );
        Ok(result)
    }

    /// Indexed wallets are looked up by address, others by their history
    fn find_neighbors(&self, request: &WalletRequest) -> Result<Vec<SimilarWallet>> {
        let k = self.decision.fallback_k;
        if self.similarity.contains(&request.address) {
            self.similarity.find_similar_wallets(&request.address, k)
        } else {
            self.similarity
                .find_similar_to_history(&request.address, &request.transactions, k)
        }
    }
}
