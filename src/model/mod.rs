//! Serialized classifier and scaler
//!
//! The offline training job exports two JSON artifacts: the fitted scaler
//! and the selected classifier. Both are loaded once at startup and checked
//! against the feature layout before serving.

pub mod classifier;
pub mod forest;
pub mod linear;
pub mod scaler;

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{Error, Result};
use crate::wallet::{FeatureVector, FEATURE_COUNT};

pub use classifier::{Classifier, Prediction};
pub use forest::{DecisionTree, ForestClassifier, TreeNode};
pub use linear::LogisticClassifier;
pub use scaler::StandardScaler;

/// Classifier artifact, tagged by `kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierModel {
    RandomForest(ForestClassifier),
    Logistic(LogisticClassifier),
}

impl ClassifierModel {
    pub fn kind(&self) -> &'static str {
        match self {
            ClassifierModel::RandomForest(_) => "random_forest",
            ClassifierModel::Logistic(_) => "logistic",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            ClassifierModel::RandomForest(m) => m.validate(),
            ClassifierModel::Logistic(m) => m.validate(),
        }
    }
}

impl Classifier for ClassifierModel {
    fn classes(&self) -> &[String] {
        match self {
            ClassifierModel::RandomForest(m) => m.classes(),
            ClassifierModel::Logistic(m) => m.classes(),
        }
    }

    fn n_features(&self) -> usize {
        match self {
            ClassifierModel::RandomForest(m) => m.n_features(),
            ClassifierModel::Logistic(m) => m.n_features(),
        }
    }

    fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>> {
        match self {
            ClassifierModel::RandomForest(m) => m.predict_proba(features),
            ClassifierModel::Logistic(m) => m.predict_proba(features),
        }
    }
}

/// Scaler + classifier pair, validated against the wallet feature layout
#[derive(Debug, Clone)]
pub struct ModelBundle {
    scaler: StandardScaler,
    classifier: ClassifierModel,
}

impl ModelBundle {
    pub fn new(scaler: StandardScaler, classifier: ClassifierModel) -> Result<Self> {
        scaler.validate()?;
        classifier.validate()?;

        if scaler.n_features() != FEATURE_COUNT {
            return Err(Error::Model(format!(
                "scaler expects {} features, wallets have {}",
                scaler.n_features(),
                FEATURE_COUNT
            )));
        }
        if classifier.n_features() != FEATURE_COUNT {
            return Err(Error::Model(format!(
                "classifier expects {} features, wallets have {}",
                classifier.n_features(),
                FEATURE_COUNT
            )));
        }

        Ok(Self { scaler, classifier })
    }

    /// Load both artifacts from JSON files
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(classifier_path: P, scaler_path: Q) -> Result<Self> {
        let classifier_path = classifier_path.as_ref();
        let scaler_path = scaler_path.as_ref();

        let classifier: ClassifierModel = read_json(classifier_path)?;
        let scaler: StandardScaler = read_json(scaler_path)?;
        let bundle = Self::new(scaler, classifier)?;

        info!(
            classifier = %classifier_path.display(),
            scaler = %scaler_path.display(),
            kind = bundle.classifier.kind(),
            classes = ?bundle.classes(),
            "Loaded model artifacts"
        );

        Ok(bundle)
    }

    pub fn classes(&self) -> &[String] {
        self.classifier.classes()
    }

    pub fn classifier(&self) -> &ClassifierModel {
        &self.classifier
    }

    /// Scale and classify one wallet
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction> {
        let scaled = self.scaler.transform(features.as_slice())?;
        self.classifier.predict(&scaled)
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| Error::Model(format!("{}: {}", path.display(), e)))?;
    serde_json::from_str(&data)
        .map_err(|e| Error::Deserialization(format!("{}: {}", path.display(), e)))
}
