//! Model metadata and global feature importance

use axum::{extract::State, Json};
use serde::Serialize;
use shared::{FeatureAttribution, RiskLevel, FEATURE_SCHEMA};

use crate::error::{AppError, AppResult};
use crate::external::EnvironmentalDataProvider;
use crate::model::{FeatureStats, ModelMetadata};
use crate::AppState;

#[derive(Serialize)]
pub struct ModelInfoResponse {
    #[serde(flatten)]
    pub metadata: ModelMetadata,
    pub feature_names: Vec<&'static str>,
    pub classes: Vec<RiskLevel>,
    pub feature_stats: FeatureStats,
    pub background_rows: usize,
    /// Mean absolute additive attribution, largest first
    pub global_importance: Vec<FeatureAttribution>,
}

pub async fn model_info<P: EnvironmentalDataProvider>(
    State(state): State<AppState<P>>,
) -> AppResult<Json<ModelInfoResponse>> {
    let engine = state.pipeline.engine().clone();
    let global_importance = tokio::task::spawn_blocking(move || engine.global_importance())
        .await
        .map_err(|e| AppError::Internal(format!("Importance worker failed: {}", e)))?
        .map_err(|e| AppError::Internal(e.to_string()))?;

    let model = state.pipeline.model();
    Ok(Json(ModelInfoResponse {
        metadata: model.metadata.clone(),
        feature_names: FEATURE_SCHEMA.names().to_vec(),
        classes: RiskLevel::ALL.to_vec(),
        feature_stats: model.feature_stats.clone(),
        background_rows: model.background.len(),
        global_importance,
    }))
}
