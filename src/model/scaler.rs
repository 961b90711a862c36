//! Standard scaler: per-feature centering and scaling

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-feature `(x - mean) / scale`, as fitted by the training job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self> {
        let scaler = Self { mean, scale };
        scaler.validate()?;
        Ok(scaler)
    }

    /// Fit on row-major samples (population std, zero variance → scale 1)
    pub fn fit(samples: &[Vec<f64>]) -> Result<Self> {
        let first = samples
            .first()
            .ok_or_else(|| Error::Model("cannot fit scaler on zero samples".into()))?;
        let n_features = first.len();
        if samples.iter().any(|s| s.len() != n_features) {
            return Err(Error::Model("ragged samples".into()));
        }

        let n = samples.len() as f64;
        let mut mean = vec![0.0; n_features];
        for sample in samples {
            for (m, x) in mean.iter_mut().zip(sample) {
                *m += x / n;
            }
        }

        let mut scale = vec![0.0; n_features];
        for sample in samples {
            for ((s, x), m) in scale.iter_mut().zip(sample).zip(&mean) {
                *s += (x - m).powi(2) / n;
            }
        }
        for s in &mut scale {
            *s = if *s > 0.0 { s.sqrt() } else { 1.0 };
        }

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn validate(&self) -> Result<()> {
        if self.mean.len() != self.scale.len() {
            return Err(Error::Model(format!(
                "scaler mean has {} entries but scale has {}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err(Error::Model("scaler contains non-finite values".into()));
        }
        Ok(())
    }

    /// Scale one sample
    pub fn transform(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.n_features() {
            return Err(Error::FeatureMismatch {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        Ok(features
            .iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((x, m), s)| {
                let s = if *s == 0.0 { 1.0 } else { *s };
                (x - m) / s
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform() {
        let scaler = StandardScaler::new(vec![1.0, 10.0], vec![2.0, 0.0]).unwrap();
        let scaled = scaler.transform(&[3.0, 12.0]).unwrap();
        assert_eq!(scaled, vec![1.0, 2.0]);
    }

    #[test]
    fn test_transform_length_mismatch() {
        let scaler = StandardScaler::new(vec![0.0, 0.0], vec![1.0, 1.0]).unwrap();
        assert!(matches!(
            scaler.transform(&[1.0]),
            Err(Error::FeatureMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_fit() {
        let scaler = StandardScaler::fit(&[vec![1.0, 5.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(scaler.mean, vec![2.0, 5.0]);
        assert_eq!(scaler.scale, vec![1.0, 1.0]);

        let scaled = scaler.transform(&[3.0, 5.0]).unwrap();
        assert_eq!(scaled, vec![1.0, 0.0]);
    }

    #[test]
    fn test_rejects_mismatched_lengths() {
        assert!(StandardScaler::new(vec![0.0], vec![1.0, 1.0]).is_err());
        assert!(StandardScaler::fit(&[]).is_err());
    }

    #[test]
    fn test_deserialize() {
        let scaler: StandardScaler =
            serde_json::from_str(r#"{"mean": [0.5], "scale": [2.0]}"#).unwrap();
        assert_eq!(scaler.transform(&[4.5]).unwrap(), vec![2.0]);
    }
}
