//! HTTP handler for risk prediction

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use shared::{
    ClassProbabilities, Explanation, Feature, FeatureAttribution, PatientProfile, RiskLevel,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::EnvironmentalDataProvider;
use crate::services::{DataSource, ExplanationOutcome, PredictionOutcome, PredictionRequest};
use crate::AppState;

fn default_city() -> String {
    "Pune".to_string()
}

fn default_patient_age() -> i32 {
    35
}

fn default_severe_attacks() -> i32 {
    1
}

fn default_adherence() -> f64 {
    0.8
}

fn default_explain() -> bool {
    true
}

/// Query parameters for a prediction
#[derive(Debug, Deserialize, Validate)]
pub struct PredictQuery {
    #[serde(default = "default_city")]
    #[validate(length(min = 1, max = 100))]
    pub city: String,

    #[serde(default = "default_patient_age")]
    #[validate(range(min = 1))]
    pub patient_age: i32,

    #[serde(default = "default_severe_attacks")]
    #[validate(range(min = 0))]
    pub patient_history_severe_attacks: i32,

    #[serde(default = "default_adherence")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub medication_adherence: f64,

    pub seed: Option<u64>,

    #[serde(default = "default_explain")]
    pub explain: bool,
}

/// One explanation mode with its ranked contributors
#[derive(Debug, Serialize)]
pub struct AttributionPayload {
    #[serde(flatten)]
    pub explanation: Explanation,
    pub top_contributors: Vec<FeatureAttribution>,
}

#[derive(Debug, Serialize)]
pub struct ExplanationPayload {
    pub seed: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additive: Option<AttributionPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub surrogate: Option<AttributionPayload>,
}

#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub prediction_id: Uuid,
    pub city: String,
    pub pm25: f64,
    pub pm10: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub pollen_level: f64,
    pub patient_age: i32,
    pub patient_history_severe_attacks: i32,
    pub medication_adherence: f64,
    pub asthma_risk: RiskLevel,
    pub advice: String,
    pub confidence: f64,
    pub probabilities: ClassProbabilities,
    pub model_version: String,
    pub model_digest: String,
    pub data_source: DataSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<ExplanationPayload>,
    pub explanation_unavailable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation_unavailable_reason: Option<String>,
}

impl PredictionResponse {
    pub fn from_outcome(outcome: PredictionOutcome, top_n: usize) -> Self {
        let to_payload = |explanation: Explanation| AttributionPayload {
            top_contributors: explanation.top(top_n),
            explanation,
        };

        let (explanation, explanation_unavailable_reason) = match outcome.explanation {
            ExplanationOutcome::Available(report) => (
                Some(ExplanationPayload {
                    seed: outcome.seed,
                    additive: report.additive.map(to_payload),
                    surrogate: report.surrogate.map(to_payload),
                }),
                None,
            ),
            ExplanationOutcome::Unavailable { reason } => (None, Some(reason)),
            ExplanationOutcome::NotRequested => (None, None),
        };

        let v = &outcome.vector;
        Self {
            prediction_id: outcome.prediction_id,
            city: outcome.city,
            pm25: v.get(Feature::Pm25),
            pm10: v.get(Feature::Pm10),
            temperature: v.get(Feature::Temperature),
            humidity: v.get(Feature::Humidity),
            pressure: v.get(Feature::Pressure),
            wind_speed: v.get(Feature::WindSpeed),
            pollen_level: v.get(Feature::PollenLevel),
            patient_age: outcome.profile.age,
            patient_history_severe_attacks: outcome.profile.history_severe_attacks,
            medication_adherence: outcome.profile.medication_adherence,
            asthma_risk: outcome.prediction.label,
            advice: outcome.advice,
            confidence: outcome.prediction.confidence(),
            probabilities: outcome.prediction.probabilities,
            model_version: outcome.model_version,
            model_digest: outcome.model_digest,
            data_source: outcome.data_source,
            explanation,
            explanation_unavailable: explanation_unavailable_reason.is_some(),
            explanation_unavailable_reason,
        }
    }
}

/// First failing field of a derive-validated query, in field-name order
fn first_invalid_field(errors: &validator::ValidationErrors) -> AppError {
    let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
    fields.sort_by_key(|(field, _)| *field);

    match fields.first() {
        Some((field, errs)) => {
            let code = errs.first().map(|e| e.code.to_string()).unwrap_or_default();
            AppError::Validation {
                field: field.to_string(),
                message: format!("{} failed {} check", field, code),
            }
        }
        None => AppError::Validation {
            field: "query".to_string(),
            message: errors.to_string(),
        },
    }
}

/// Predict asthma risk for a patient at a location
pub async fn predict<P: EnvironmentalDataProvider>(
    State(state): State<AppState<P>>,
    query: Result<Query<PredictQuery>, QueryRejection>,
) -> AppResult<Json<PredictionResponse>> {
    let Query(query) = query.map_err(|rejection| AppError::Validation {
        field: "query".to_string(),
        message: rejection.body_text(),
    })?;
    query.validate().map_err(|e| first_invalid_field(&e))?;

    let profile = PatientProfile::new(
        query.patient_age,
        query.patient_history_severe_attacks,
        query.medication_adherence,
    );
    let mut request = PredictionRequest::new(query.city, profile);
    if let Some(seed) = query.seed {
        request = request.with_seed(seed);
    }
    if !query.explain {
        request = request.without_explanation();
    }

    let outcome = state.pipeline.predict(request).await?;
    Ok(Json(PredictionResponse::from_outcome(
        outcome,
        state.config.advice.top_features,
    )))
}
