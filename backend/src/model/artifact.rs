//! Model artifact loading
//!
//! Artifacts are JSON documents produced by the training job. Loading checks
//! the feature schema, the class list and every number before anything is
//! served; a failure here is fatal at startup.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::{RiskLevel, CLASS_COUNT, FEATURE_COUNT, FEATURE_SCHEMA};
use thiserror::Error;

use super::forest::{DecisionTree, TreeEnsemble, TreeNode};
use super::logistic::{LogisticModel, Scaler};
use super::{FeatureRow, LoadedModel, ModelFamily, ModelMetadata, RiskModel};

/// No usable model could be loaded
#[derive(Error, Debug)]
pub enum ModelUnavailableError {
    #[error("cannot read model artifact {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model artifact is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("model artifact rejected: {0}")]
    Invalid(String),
}

/// Training-data statistics per feature
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FeatureStats {
    pub mean: [f64; FEATURE_COUNT],
    pub std: [f64; FEATURE_COUNT],
}

#[derive(Debug, Deserialize)]
struct ArtifactDocument {
    model_version: String,
    schema_version: u32,
    feature_names: Vec<String>,
    classes: Vec<String>,
    feature_stats: FeatureStats,
    background: Vec<FeatureRow>,
    model: ModelSpec,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "family", rename_all = "snake_case")]
enum ModelSpec {
    RandomForest {
        trees: Vec<TreeSpec>,
    },
    LogisticRegression {
        scaler: Scaler,
        coefficients: [[f64; FEATURE_COUNT]; CLASS_COUNT],
        intercepts: [f64; CLASS_COUNT],
    },
}

#[derive(Debug, Deserialize)]
struct TreeSpec {
    nodes: Vec<TreeNode>,
}

/// Read and validate an artifact from disk
pub fn load_artifact(path: impl AsRef<Path>) -> Result<LoadedModel, ModelUnavailableError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| ModelUnavailableError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    parse_artifact(&bytes)
}

/// Validate an artifact already held in memory
pub fn parse_artifact(bytes: &[u8]) -> Result<LoadedModel, ModelUnavailableError> {
    let digest = format!("{:x}", Sha256::digest(bytes));
    let document: ArtifactDocument = serde_json::from_slice(bytes)?;

    if document.schema_version != FEATURE_SCHEMA.version {
        return Err(ModelUnavailableError::Invalid(format!(
            "artifact schema version {} does not match feature schema version {}",
            document.schema_version, FEATURE_SCHEMA.version
        )));
    }
    if !FEATURE_SCHEMA.matches(&document.feature_names) {
        return Err(ModelUnavailableError::Invalid(format!(
            "artifact feature order {:?} does not match {:?}",
            document.feature_names,
            FEATURE_SCHEMA.names()
        )));
    }
    let expected_classes: Vec<&str> = RiskLevel::ALL.iter().map(|l| l.as_str()).collect();
    if document.classes != expected_classes {
        return Err(ModelUnavailableError::Invalid(format!(
            "artifact classes {:?} do not match {:?}",
            document.classes, expected_classes
        )));
    }

    validate_stats(&document.feature_stats)?;
    validate_background(&document.background)?;

    let (family, model): (ModelFamily, Arc<dyn RiskModel>) = match document.model {
        ModelSpec::RandomForest { trees } => {
            let trees = trees
                .into_iter()
                .map(|t| DecisionTree::new(t.nodes))
                .collect::<Result<Vec<_>, _>>()?;
            (ModelFamily::RandomForest, Arc::new(TreeEnsemble::new(trees)?))
        }
        ModelSpec::LogisticRegression {
            scaler,
            coefficients,
            intercepts,
        } => (
            ModelFamily::LogisticRegression,
            Arc::new(LogisticModel::new(scaler, coefficients, intercepts)?),
        ),
    };

    let metadata = ModelMetadata {
        model_version: document.model_version,
        family,
        schema_version: document.schema_version,
        digest,
    };

    Ok(LoadedModel::new(
        metadata,
        document.feature_stats,
        document.background,
        model,
    ))
}

fn validate_stats(stats: &FeatureStats) -> Result<(), ModelUnavailableError> {
    if stats.mean.iter().any(|v| !v.is_finite()) {
        return Err(ModelUnavailableError::Invalid(
            "feature means must be finite".into(),
        ));
    }
    if stats.std.iter().any(|v| !v.is_finite() || *v <= 0.0) {
        return Err(ModelUnavailableError::Invalid(
            "feature standard deviations must be positive".into(),
        ));
    }
    Ok(())
}

fn validate_background(background: &[FeatureRow]) -> Result<(), ModelUnavailableError> {
    if background.is_empty() {
        return Err(ModelUnavailableError::Invalid(
            "background set is empty".into(),
        ));
    }
    if background.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ModelUnavailableError::Invalid(
            "background rows must be finite".into(),
        ));
    }
    Ok(())
}
