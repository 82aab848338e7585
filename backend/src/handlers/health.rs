//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::external::EnvironmentalDataProvider;
use crate::model::ModelMetadata;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub model: ModelMetadata,
}

/// Health check endpoint handler
pub async fn health_check<P: EnvironmentalDataProvider>(
    State(state): State<AppState<P>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        environment: state.config.environment.clone(),
        model: state.pipeline.model().metadata.clone(),
    })
}
