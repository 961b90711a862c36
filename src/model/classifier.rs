//! Classifier trait and prediction output

use serde::Serialize;

use crate::error::{Error, Result};

/// Probabilistic multi-class classifier over scaled features
pub trait Classifier: Send + Sync {
    /// Class labels in probability order
    fn classes(&self) -> &[String];

    /// Number of input features
    fn n_features(&self) -> usize;

    /// Class probabilities for one scaled sample
    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>>;

    /// Most probable class; the first maximum wins ties
    fn predict(&self, features: &[f64]) -> Result<Prediction> {
        let probabilities = self.predict_proba(features)?;
        let (index, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .fold(None, |best: Option<(usize, f64)>, (i, p)| match best {
                Some((_, bp)) if bp >= p => best,
                _ => Some((i, p)),
            })
            .ok_or_else(|| Error::Model("classifier produced no probabilities".into()))?;

        let label = self
            .classes()
            .get(index)
            .cloned()
            .ok_or_else(|| Error::Model(format!("no class at index {}", index)))?;

        Ok(Prediction {
            label,
            confidence,
            probabilities,
        })
    }
}

/// Classifier output for one sample
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub label: String,
    pub confidence: f64,
    pub probabilities: Vec<f64>,
}

/// Fail with `FeatureMismatch` unless `features` has `expected` entries
pub(crate) fn check_feature_count(expected: usize, features: &[f64]) -> Result<()> {
    if features.len() != expected {
        return Err(Error::FeatureMismatch {
            expected,
            actual: features.len(),
        });
    }
    Ok(())
}
