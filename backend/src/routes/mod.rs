//! Route definitions for the AsthmaShield inference service

use axum::{routing::get, Router};

use crate::{external::EnvironmentalDataProvider, handlers, AppState};

/// Create API routes
pub fn api_routes<P: EnvironmentalDataProvider>() -> Router<AppState<P>> {
    Router::new()
        .route("/health", get(handlers::health_check::<P>))
        .route("/predict", get(handlers::predict::<P>))
        .route("/model", get(handlers::model_info::<P>))
}
