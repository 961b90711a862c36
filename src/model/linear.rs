//! Logistic regression evaluation (multinomial or binary)

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::classifier::{check_feature_count, Classifier};

/// Linear model with softmax (one coefficient row per class) or sigmoid
/// (a single row for two classes) output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub classes: Vec<String>,
    pub coef: Vec<Vec<f64>>,
    pub intercept: Vec<f64>,
}

impl LogisticClassifier {
    fn is_binary(&self) -> bool {
        self.classes.len() == 2 && self.coef.len() == 1
    }

    pub fn validate(&self) -> Result<()> {
        if self.classes.len() < 2 {
            return Err(Error::Model("logistic model needs at least two classes".into()));
        }
        let rows = if self.is_binary() { 1 } else { self.classes.len() };
        if self.coef.len() != rows || self.intercept.len() != rows {
            return Err(Error::Model(format!(
                "expected {} coefficient rows and intercepts, got {} and {}",
                rows,
                self.coef.len(),
                self.intercept.len()
            )));
        }
        let width = self.coef[0].len();
        if width == 0 || self.coef.iter().any(|row| row.len() != width) {
            return Err(Error::Model("ragged or empty coefficient rows".into()));
        }
        Ok(())
    }

    fn decision(&self, row: usize, features: &[f64]) -> f64 {
        self.coef[row]
            .iter()
            .zip(features)
            .map(|(w, x)| w * x)
            .sum::<f64>()
            + self.intercept[row]
    }
}

impl Classifier for LogisticClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.coef.first().map(Vec::len).unwrap_or(0)
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        check_feature_count(self.n_features(), features)?;

        if self.is_binary() {
            let p = 1.0 / (1.0 + (-self.decision(0, features)).exp());
            return Ok(vec![1.0 - p, p]);
        }

        let scores: Vec<f64> = (0..self.coef.len())
            .map(|row| self.decision(row, features))
            .collect();
        // Shift by the max score for numerical stability
        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / total).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_sigmoid() {
        let model = LogisticClassifier {
            classes: vec!["regular_user".into(), "drop_hunter".into()],
            coef: vec![vec![1.0, 0.0]],
            intercept: vec![0.0],
        };
        model.validate().unwrap();

        let p = model.predict_proba(&[0.0, 5.0]).unwrap();
        assert!((p[0] - 0.5).abs() < 1e-12);

        let prediction = model.predict(&[4.0, 0.0]).unwrap();
        assert_eq!(prediction.label, "drop_hunter");
        assert!(prediction.confidence > 0.98);
    }

    #[test]
    fn test_multinomial_softmax() {
        let model = LogisticClassifier {
            classes: vec!["a".into(), "b".into(), "c".into()],
            coef: vec![vec![1.0], vec![0.0], vec![-1.0]],
            intercept: vec![0.0, 0.0, 0.0],
        };
        model.validate().unwrap();

        let p = model.predict_proba(&[0.0]).unwrap();
        for v in &p {
            assert!((v - 1.0 / 3.0).abs() < 1e-12);
        }

        let p = model.predict_proba(&[1000.0]).unwrap();
        assert!((p.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(p[0] > 0.99);
    }

    #[test]
    fn test_validate_shapes() {
        let model = LogisticClassifier {
            classes: vec!["a".into(), "b".into(), "c".into()],
            coef: vec![vec![1.0]],
            intercept: vec![0.0],
        };
        assert!(model.validate().is_err());
    }
}
