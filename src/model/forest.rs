//! Random forest evaluation
//!
//! Trees are exported by the training job as flat node arrays. Node 0 is the
//! root and children always sit at higher indices, so evaluation terminates.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::classifier::{check_feature_count, Classifier};

/// Tree node: a threshold split or a leaf of per-class weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    /// Go `left` when `features[feature] <= threshold`, else `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Per-class sample weights (normalized at prediction time)
    Leaf { value: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    pub nodes: Vec<TreeNode>,
}

impl DecisionTree {
    fn validate(&self, n_features: usize, n_classes: usize) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(Error::Model("tree has no nodes".into()));
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(Error::Model(format!(
                            "node {} splits on feature {} of {}",
                            idx, feature, n_features
                        )));
                    }
                    if threshold.is_nan() {
                        return Err(Error::Model(format!("node {} has NaN threshold", idx)));
                    }
                    for child in [left, right] {
                        if *child <= idx || *child >= self.nodes.len() {
                            return Err(Error::Model(format!(
                                "node {} has invalid child {}",
                                idx, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.len() != n_classes {
                        return Err(Error::Model(format!(
                            "leaf {} has {} weights for {} classes",
                            idx,
                            value.len(),
                            n_classes
                        )));
                    }
                    if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return Err(Error::Model(format!("leaf {} has invalid weights", idx)));
                    }
                    if value.iter().sum::<f64>() <= 0.0 {
                        return Err(Error::Model(format!("leaf {} has zero total weight", idx)));
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaf weights reached by `features`
    fn leaf(&self, features: &[f64]) -> Result<&[f64]> {
        let mut idx = 0;
        // Bounded by node count; validation guarantees children move forward
        for _ in 0..self.nodes.len() {
            match &self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                TreeNode::Leaf { value } => return Ok(value.as_slice()),
            }
        }
        Err(Error::Model("tree evaluation did not reach a leaf".into()))
    }
}

/// Ensemble of decision trees averaging normalized leaf weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestClassifier {
    pub classes: Vec<String>,
    pub n_features: usize,
    pub trees: Vec<DecisionTree>,
}

impl ForestClassifier {
    pub fn validate(&self) -> Result<()> {
        if self.classes.is_empty() {
            return Err(Error::Model("forest has no classes".into()));
        }
        if self.trees.is_empty() {
            return Err(Error::Model("forest has no trees".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.classes.len())
                .map_err(|e| Error::Model(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }
}

impl Classifier for ForestClassifier {
    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        check_feature_count(self.n_features, features)?;

        let mut probabilities = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            let leaf = tree.leaf(features)?;
            let total: f64 = leaf.iter().sum();
            for (p, w) in probabilities.iter_mut().zip(leaf) {
                *p += w / total;
            }
        }

        let n_trees = self.trees.len() as f64;
        for p in &mut probabilities {
            *p /= n_trees;
        }
        Ok(probabilities)
    }
}
