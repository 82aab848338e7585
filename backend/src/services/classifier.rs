//! Risk classification over a loaded model

use std::sync::Arc;

use shared::{ClassProbabilities, FeatureVector, RiskPrediction};
use thiserror::Error;

use crate::model::LoadedModel;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("feature vector uses schema version {found}, model expects {expected}")]
    SchemaViolation { expected: u32, found: u32 },

    #[error("model produced unusable probabilities: {0:?}")]
    InvalidOutput([f64; shared::CLASS_COUNT]),
}

/// Family-agnostic wrapper mapping feature vectors to risk labels
///
/// Inference is deterministic: the same vector and model version always give
/// the same label and probabilities.
#[derive(Debug, Clone)]
pub struct RiskClassifier {
    model: Arc<LoadedModel>,
}

impl RiskClassifier {
    pub fn new(model: Arc<LoadedModel>) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &Arc<LoadedModel> {
        &self.model
    }

    pub fn classify(&self, vector: &FeatureVector) -> Result<RiskPrediction, ClassifierError> {
        let expected = self.model.metadata.schema_version;
        if vector.schema_version() != expected {
            return Err(ClassifierError::SchemaViolation {
                expected,
                found: vector.schema_version(),
            });
        }

        let raw = self.model.risk_model().predict_proba(vector.values());
        let total: f64 = raw.iter().sum();
        if raw.iter().any(|p| !p.is_finite() || *p < 0.0) || total <= 0.0 || !total.is_finite() {
            return Err(ClassifierError::InvalidOutput(raw));
        }

        let probabilities = ClassProbabilities::from_array(raw.map(|p| p / total));
        Ok(RiskPrediction::from_probabilities(probabilities))
    }
}
