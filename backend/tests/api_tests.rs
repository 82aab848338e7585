//! HTTP API integration tests
//!
//! Drives the router in-process with `tower::ServiceExt::oneshot`.

mod common;

use asthma_shield_backend::{create_app, services::PredictionPipeline, AppState};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use common::FixedProvider;
use serde_json::Value;
use tower::ServiceExt;

fn app() -> Router {
    app_with(common::test_config())
}

fn app_with(config: asthma_shield_backend::Config) -> Router {
    let pipeline = PredictionPipeline::from_config(
        common::forest(),
        FixedProvider::new(common::pune_measurements()),
        &config,
    );
    create_app(AppState::new(config, pipeline))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

const PUNE_QUERY: &str = "/api/v1/predict?city=Pune&patient_age=35\
    &patient_history_severe_attacks=2&medication_adherence=0.8";

// ============================================================================
// Predict
// ============================================================================

#[tokio::test]
async fn test_predict_returns_full_payload() {
    let (status, body) = get(app(), PUNE_QUERY).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city"], "Pune");
    assert_eq!(body["pm25"], 6.12);
    assert_eq!(body["pollen_level"], 50.0);
    assert_eq!(body["patient_history_severe_attacks"], 2);
    assert_eq!(body["asthma_risk"], "Moderate");
    assert_eq!(body["data_source"], "live");
    assert_eq!(body["model_version"], "asthma-risk-forest-2024.06");
    assert_eq!(body["model_digest"], common::forest().metadata.digest.as_str());
    assert_eq!(body["model_digest"].as_str().unwrap().len(), 64);
    assert_eq!(body["explanation_unavailable"], false);
    assert!(body["advice"].as_str().unwrap().contains("PM2.5=6.12"));

    let additive = &body["explanation"]["additive"];
    assert_eq!(additive["attributions"].as_array().unwrap().len(), 10);
    assert_eq!(additive["top_contributors"].as_array().unwrap().len(), 3);
    assert!(body["explanation"]["surrogate"]["fidelity"].is_number());
}

#[tokio::test]
async fn test_predict_uses_defaults() {
    let (status, body) = get(app(), "/api/v1/predict").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["city"], "Pune");
    assert_eq!(body["patient_age"], 35);
    assert_eq!(body["patient_history_severe_attacks"], 1);
    assert_eq!(body["medication_adherence"], 0.8);
}

#[tokio::test]
async fn test_predict_without_explanation() {
    let (status, body) = get(app(), &format!("{}&explain=false", PUNE_QUERY)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("explanation").is_none());
    assert_eq!(body["explanation_unavailable"], false);
}

#[tokio::test]
async fn test_explanation_timeout_still_answers() {
    let mut config = common::test_config();
    config.explanation.budget_ms = 0;
    let (status, body) = get(app_with(config), PUNE_QUERY).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["asthma_risk"], "Moderate");
    assert_eq!(body["explanation_unavailable"], true);
    assert!(body["explanation_unavailable_reason"]
        .as_str()
        .unwrap()
        .contains("budget"));
}

#[tokio::test]
async fn test_invalid_adherence_is_bad_request() {
    let uri = "/api/v1/predict?city=Pune&medication_adherence=1.5";
    let (status, body) = get(app(), uri).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["error"]["field"], "medication_adherence");
}

#[tokio::test]
async fn test_malformed_query_is_bad_request() {
    let (status, body) = get(app(), "/api/v1/predict?patient_age=abc").await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_unknown_city_is_not_found() {
    let (status, body) = get(app(), "/api/v1/predict?city=Atlantis").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "LOCATION_NOT_FOUND");
}

// ============================================================================
// Health and Model
// ============================================================================

#[tokio::test]
async fn test_health_reports_model() {
    for uri in ["/health", "/api/v1/health"] {
        let (status, body) = get(app(), uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["model"]["model_version"], "asthma-risk-forest-2024.06");
    }
}

#[tokio::test]
async fn test_model_info_lists_schema() {
    let (status, body) = get(app(), "/api/v1/model").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["family"], "random_forest");
    assert_eq!(body["feature_names"][0], "pm25");
    assert_eq!(body["classes"], serde_json::json!(["Low", "Moderate", "High"]));
    assert_eq!(body["global_importance"].as_array().unwrap().len(), 10);
}

#[tokio::test]
async fn test_model_info_is_stable_across_calls() {
    let app = app();
    let (_, first) = get(app.clone(), "/api/v1/model").await;
    let (_, second) = get(app, "/api/v1/model").await;
    assert_eq!(first["global_importance"], second["global_importance"]);
}
