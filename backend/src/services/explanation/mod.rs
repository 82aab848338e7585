//! Explanation engine
//!
//! Two attribution modes share one [`Explanation`] shape:
//! - additive: interventional Shapley values of the output margin against the
//!   artifact's background set (exact for tree ensembles, sampled otherwise)
//! - local surrogate: coefficients of a proximity-weighted ridge regression
//!   fitted on perturbations around the input, with a fidelity check
//!
//! Both are seeded and CPU-bound, so the engine runs them on a blocking worker
//! under a cooperative [`Deadline`].

pub mod additive;
pub mod surrogate;

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use serde::Serialize;
use shared::{
    rank_attributions, ClassProbabilities, Explanation, FeatureAttribution, FeatureVector,
    RiskLevel, FEATURE_COUNT, FEATURE_SCHEMA,
};
use thiserror::Error;

use crate::config::{ExplanationConfig, ExplanationMode};
use crate::model::LoadedModel;

pub use surrogate::SurrogateParams;

/// Relative tolerance of the additive invariant
pub const ADDITIVE_TOLERANCE: f64 = 1e-3;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExplanationError {
    #[error("explanation exceeded its {budget_ms} ms budget")]
    Timeout { budget_ms: u64 },

    #[error("feature vector uses schema version {found}, model expects {expected}")]
    SchemaViolation { expected: u32, found: u32 },

    #[error("surrogate fit failed: {0}")]
    Degenerate(String),

    #[error("explanation worker failed: {0}")]
    Worker(String),
}

/// Point in time after which explanation work stops
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    expires_at: Option<Instant>,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            expires_at: Some(Instant::now() + budget),
            budget,
        }
    }

    pub fn unbounded() -> Self {
        Self {
            expires_at: None,
            budget: Duration::MAX,
        }
    }

    pub fn check(&self) -> Result<(), ExplanationError> {
        match self.expires_at {
            Some(at) if Instant::now() >= at => Err(ExplanationError::Timeout {
                budget_ms: self.budget.as_millis() as u64,
            }),
            _ => Ok(()),
        }
    }
}

/// Attributions computed for one prediction
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExplanationReport {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additive: Option<Explanation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surrogate: Option<Explanation>,
}

impl ExplanationReport {
    /// Attributions used for advice: additive when present
    pub fn primary(&self) -> Option<&Explanation> {
        self.additive.as_ref().or(self.surrogate.as_ref())
    }
}

/// Computes additive and surrogate attributions for a loaded model
#[derive(Debug, Clone)]
pub struct ExplanationEngine {
    model: Arc<LoadedModel>,
    config: ExplanationConfig,
    /// Shared by clones; the model never changes after load
    importance: Arc<OnceLock<Vec<FeatureAttribution>>>,
}

impl ExplanationEngine {
    pub fn new(model: Arc<LoadedModel>, config: ExplanationConfig) -> Self {
        Self {
            model,
            config,
            importance: Arc::new(OnceLock::new()),
        }
    }

    pub fn default_seed(&self) -> u64 {
        self.config.seed
    }

    fn surrogate_params(&self) -> SurrogateParams {
        SurrogateParams {
            samples: self.config.surrogate_samples,
            runs: self.config.surrogate_runs,
            radius: self.config.perturbation_radius,
            kernel_width: self.config.kernel_width,
            ridge: self.config.ridge,
            fidelity_threshold: self.config.fidelity_threshold,
        }
    }

    /// Explain `target` for `vector` within the configured budget
    pub fn explain(
        &self,
        vector: &FeatureVector,
        target: RiskLevel,
        seed: u64,
    ) -> Result<ExplanationReport, ExplanationError> {
        let deadline = Deadline::after(Duration::from_millis(self.config.budget_ms));
        self.explain_until(vector, target, seed, &deadline)
    }

    pub fn explain_until(
        &self,
        vector: &FeatureVector,
        target: RiskLevel,
        seed: u64,
        deadline: &Deadline,
    ) -> Result<ExplanationReport, ExplanationError> {
        let expected = self.model.metadata.schema_version;
        if vector.schema_version() != expected {
            return Err(ExplanationError::SchemaViolation {
                expected,
                found: vector.schema_version(),
            });
        }
        deadline.check()?;

        let x = vector.values();
        let mode = self.config.mode;

        let additive = match mode {
            ExplanationMode::Additive | ExplanationMode::Both => {
                let explanation = additive::additive_attribution(
                    &self.model,
                    x,
                    target,
                    seed,
                    self.config.permutations,
                    deadline,
                )?;
                if !explanation.is_additive_within(ADDITIVE_TOLERANCE) {
                    tracing::warn!(
                        gap = explanation.additivity_gap(),
                        "Additive attributions drifted from the output margin"
                    );
                }
                Some(explanation)
            }
            ExplanationMode::Surrogate => None,
        };

        let surrogate = match mode {
            ExplanationMode::Surrogate | ExplanationMode::Both => {
                Some(surrogate::surrogate_attribution(
                    &self.model,
                    x,
                    target,
                    seed,
                    &self.surrogate_params(),
                    deadline,
                )?)
            }
            ExplanationMode::Additive => None,
        };

        Ok(ExplanationReport {
            additive,
            surrogate,
        })
    }

    /// Run [`explain`](Self::explain) on the blocking pool
    ///
    /// The budget starts counting before the task is queued.
    pub async fn explain_blocking(
        &self,
        vector: FeatureVector,
        target: RiskLevel,
        seed: u64,
    ) -> Result<ExplanationReport, ExplanationError> {
        let deadline = Deadline::after(Duration::from_millis(self.config.budget_ms));
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.explain_until(&vector, target, seed, &deadline))
            .await
            .map_err(|e| ExplanationError::Worker(e.to_string()))?
    }

    /// Mean absolute additive attribution over the background set
    ///
    /// Each background row is explained for its own most likely class. Computed
    /// on first use and cached for the engine's lifetime.
    pub fn global_importance(&self) -> Result<Vec<FeatureAttribution>, ExplanationError> {
        if let Some(cached) = self.importance.get() {
            return Ok(cached.clone());
        }
        let computed = self.compute_global_importance()?;
        Ok(self.importance.get_or_init(|| computed).clone())
    }

    fn compute_global_importance(&self) -> Result<Vec<FeatureAttribution>, ExplanationError> {
        let deadline = Deadline::unbounded();
        let model = self.model.risk_model();
        let mut totals = [0.0; FEATURE_COUNT];

        for row in &self.model.background {
            let target = ClassProbabilities::from_array(model.predict_proba(row)).most_likely();
            let explanation = additive::additive_attribution(
                &self.model,
                row,
                target,
                self.config.seed,
                self.config.permutations,
                &deadline,
            )?;
            for attribution in &explanation.attributions {
                totals[attribution.feature.index()] += attribution.value.abs();
            }
        }

        let rows = self.model.background.len() as f64;
        let importance: Vec<FeatureAttribution> = FEATURE_SCHEMA
            .features
            .iter()
            .map(|&feature| FeatureAttribution {
                feature,
                value: totals[feature.index()] / rows,
            })
            .collect();
        Ok(rank_attributions(&importance))
    }
}

/// Attributions in schema order
pub(crate) fn to_attributions(values: &[f64; FEATURE_COUNT]) -> Vec<FeatureAttribution> {
    FEATURE_SCHEMA
        .features
        .iter()
        .map(|&feature| FeatureAttribution {
            feature,
            value: values[feature.index()],
        })
        .collect()
}
