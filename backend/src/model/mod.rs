//! Trained risk models
//!
//! A model artifact is loaded once at startup and shared read-only by every
//! request. Each model family implements [`RiskModel`]; callers never match on
//! the concrete family except to pick an exact attribution algorithm.

pub mod artifact;
pub mod forest;
pub mod logistic;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{CLASS_COUNT, FEATURE_COUNT};

pub use artifact::{load_artifact, parse_artifact, FeatureStats, ModelUnavailableError};
pub use forest::{DecisionTree, TreeEnsemble, TreeNode};
pub use logistic::LogisticModel;

/// Raw model input in schema order
pub type FeatureRow = [f64; FEATURE_COUNT];

/// Algorithm family of a trained artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    RandomForest,
    LogisticRegression,
}

impl ModelFamily {
    pub fn as_str(self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::LogisticRegression => "logistic_regression",
        }
    }
}

impl std::fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capabilities every model family provides
pub trait RiskModel: Send + Sync {
    fn family(&self) -> ModelFamily;

    /// Class probabilities in `RiskLevel` order
    fn predict_proba(&self, x: &FeatureRow) -> [f64; CLASS_COUNT];

    /// Raw output that additive attributions decompose for `class`
    fn margin(&self, x: &FeatureRow, class: usize) -> f64;

    /// Tree structure, for families that expose one
    fn as_tree_ensemble(&self) -> Option<&TreeEnsemble> {
        None
    }
}

/// Identifying details of the loaded artifact
#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub model_version: String,
    pub family: ModelFamily,
    pub schema_version: u32,
    /// Hex SHA-256 of the artifact bytes
    pub digest: String,
}

/// A validated artifact ready for inference
pub struct LoadedModel {
    pub metadata: ModelMetadata,
    pub feature_stats: FeatureStats,
    pub background: Vec<FeatureRow>,
    model: Arc<dyn RiskModel>,
}

impl LoadedModel {
    pub fn new(
        metadata: ModelMetadata,
        feature_stats: FeatureStats,
        background: Vec<FeatureRow>,
        model: Arc<dyn RiskModel>,
    ) -> Self {
        Self {
            metadata,
            feature_stats,
            background,
            model,
        }
    }

    pub fn risk_model(&self) -> &dyn RiskModel {
        self.model.as_ref()
    }

    pub fn version(&self) -> &str {
        &self.metadata.model_version
    }

    pub fn family(&self) -> ModelFamily {
        self.metadata.family
    }
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("metadata", &self.metadata)
            .field("background_rows", &self.background.len())
            .finish()
    }
}
