//! AsthmaShield - Inference Service
//!
//! Fetches environmental conditions for a location, classifies asthma risk
//! for a patient profile, explains the classification and composes advice.

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod external;
pub mod handlers;
pub mod model;
pub mod routes;
pub mod services;

pub use config::Config;

use external::EnvironmentalDataProvider;
use services::PredictionPipeline;

/// Application state shared across handlers
pub struct AppState<P> {
    pub config: Arc<Config>,
    pub pipeline: Arc<PredictionPipeline<P>>,
}

impl<P> AppState<P> {
    pub fn new(config: Config, pipeline: PredictionPipeline<P>) -> Self {
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(pipeline),
        }
    }
}

// Derived Clone would require `P: Clone`
impl<P> Clone for AppState<P> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            pipeline: Arc::clone(&self.pipeline),
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_app<P: EnvironmentalDataProvider>(state: AppState<P>) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(root))
        .route("/health", get(handlers::health_check::<P>))
        .nest("/api/v1", routes::api_routes::<P>())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Root endpoint
async fn root() -> &'static str {
    "AsthmaShield Inference API v1.0"
}
