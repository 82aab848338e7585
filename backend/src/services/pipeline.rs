//! Prediction pipeline
//!
//! One request moves through
//! `Received → Validated → Featurized → Classified → Explained → Composed → Returned`.
//! Validation, fetch and classification failures end the request. Explanation
//! failures never do: the outcome then carries the label with the reason the
//! explanation is missing.

use std::sync::Arc;

use shared::{
    validate_location_name, AdviceComposer, EnvironmentalSnapshot, FeatureVector,
    FeatureVectorBuilder, PatientProfile, RiskPrediction, ValidationError,
};
use thiserror::Error;
use uuid::Uuid;

use super::classifier::{ClassifierError, RiskClassifier};
use super::environment::{DataFetchError, DataSource, ResilientProvider};
use super::explanation::{ExplanationEngine, ExplanationReport};
use crate::config::{AdviceConfig, Config, ExplanationConfig, FetchConfig};
use crate::external::EnvironmentalDataProvider;
use crate::model::LoadedModel;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    DataFetch(#[from] DataFetchError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    Featurized,
    Classified,
    Explained,
    Composed,
    Returned,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Featurized => "featurized",
            PipelineStage::Classified => "classified",
            PipelineStage::Explained => "explained",
            PipelineStage::Composed => "composed",
            PipelineStage::Returned => "returned",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PredictionRequest {
    pub city: String,
    pub profile: PatientProfile,
    /// Overrides the configured explanation seed
    pub seed: Option<u64>,
    pub explain: bool,
}

impl PredictionRequest {
    pub fn new(city: impl Into<String>, profile: PatientProfile) -> Self {
        Self {
            city: city.into(),
            profile,
            seed: None,
            explain: true,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn without_explanation(mut self) -> Self {
        self.explain = false;
        self
    }
}

/// Whether the prediction carries an explanation
#[derive(Debug, Clone, PartialEq)]
pub enum ExplanationOutcome {
    Available(ExplanationReport),
    Unavailable { reason: String },
    NotRequested,
}

impl ExplanationOutcome {
    pub fn report(&self) -> Option<&ExplanationReport> {
        match self {
            ExplanationOutcome::Available(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, ExplanationOutcome::Unavailable { .. })
    }
}

/// Everything produced for one request
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    pub prediction_id: Uuid,
    pub city: String,
    pub snapshot: EnvironmentalSnapshot,
    pub data_source: DataSource,
    pub profile: PatientProfile,
    pub vector: FeatureVector,
    pub prediction: RiskPrediction,
    pub explanation: ExplanationOutcome,
    pub advice: String,
    pub model_version: String,
    /// Hex SHA-256 of the model artifact
    pub model_digest: String,
    pub seed: u64,
}

pub struct PredictionPipeline<P> {
    provider: ResilientProvider<P>,
    builder: FeatureVectorBuilder,
    classifier: RiskClassifier,
    engine: ExplanationEngine,
    composer: AdviceComposer,
}

impl<P: EnvironmentalDataProvider> PredictionPipeline<P> {
    pub fn new(
        model: Arc<LoadedModel>,
        provider: P,
        fetch: FetchConfig,
        explanation: ExplanationConfig,
        advice: AdviceConfig,
    ) -> Self {
        Self {
            provider: ResilientProvider::new(provider, fetch),
            builder: FeatureVectorBuilder::new(),
            classifier: RiskClassifier::new(Arc::clone(&model)),
            engine: ExplanationEngine::new(model, explanation),
            composer: AdviceComposer::new(advice.top_features),
        }
    }

    pub fn from_config(model: Arc<LoadedModel>, provider: P, config: &Config) -> Self {
        Self::new(
            model,
            provider,
            config.fetch.clone(),
            config.explanation.clone(),
            config.advice.clone(),
        )
    }

    pub fn model(&self) -> &Arc<LoadedModel> {
        self.classifier.model()
    }

    pub fn engine(&self) -> &ExplanationEngine {
        &self.engine
    }

    pub async fn predict(&self, request: PredictionRequest) -> Result<PredictionOutcome, PipelineError> {
        let prediction_id = Uuid::new_v4();
        let stage = |stage: PipelineStage| {
            tracing::debug!(%prediction_id, stage = stage.as_str(), "Pipeline stage");
        };
        stage(PipelineStage::Received);

        validate_location_name(&request.city)?;
        request.profile.validate()?;
        stage(PipelineStage::Validated);

        let city = request.city.trim();
        let fetched = self.provider.fetch(city).await?;
        let vector = self.builder.build(&fetched.snapshot, &request.profile)?;
        stage(PipelineStage::Featurized);

        let prediction = self.classifier.classify(&vector)?;
        tracing::debug!(
            %prediction_id,
            label = %prediction.label,
            confidence = prediction.confidence(),
            "Classified"
        );
        stage(PipelineStage::Classified);

        let seed = request.seed.unwrap_or_else(|| self.engine.default_seed());
        let explanation = if request.explain {
            match self.engine.explain_blocking(vector, prediction.label, seed).await {
                Ok(report) => {
                    stage(PipelineStage::Explained);
                    ExplanationOutcome::Available(report)
                }
                Err(err) => {
                    tracing::warn!(%prediction_id, error = %err, "Explanation unavailable");
                    ExplanationOutcome::Unavailable {
                        reason: err.to_string(),
                    }
                }
            }
        } else {
            ExplanationOutcome::NotRequested
        };

        let advice = self.composer.compose(
            &prediction,
            &vector,
            &request.profile,
            explanation.report().and_then(ExplanationReport::primary),
        );
        stage(PipelineStage::Composed);

        let outcome = PredictionOutcome {
            prediction_id,
            city: city.to_string(),
            snapshot: fetched.snapshot,
            data_source: fetched.source,
            profile: request.profile,
            vector,
            prediction,
            explanation,
            advice,
            model_version: self.model().version().to_string(),
            model_digest: self.model().metadata.digest.clone(),
            seed,
        };
        stage(PipelineStage::Returned);

        Ok(outcome)
    }
}
