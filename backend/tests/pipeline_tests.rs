//! Prediction pipeline integration tests
//!
//! End-to-end scenarios through fetch, featurization, classification,
//! explanation and advice with in-process providers.

mod common;

use std::time::Duration;

use asthma_shield_backend::services::{
    DataFetchError, DataSource, PipelineError, PredictionPipeline, PredictionRequest,
};
use common::{FixedProvider, SlowProvider};
use proptest::prelude::*;
use shared::{PatientProfile, RiskLevel, ValidationError};

fn pune_pipeline() -> PredictionPipeline<FixedProvider> {
    PredictionPipeline::from_config(
        common::forest(),
        FixedProvider::new(common::pune_measurements()),
        &common::test_config(),
    )
}

// ============================================================================
// Scenario Tests
// ============================================================================

#[tokio::test]
async fn test_pune_scenario_is_moderate() {
    let pipeline = pune_pipeline();
    let outcome = pipeline
        .predict(PredictionRequest::new("Pune", common::pune_profile()))
        .await
        .unwrap();

    assert_eq!(outcome.prediction.label, RiskLevel::Moderate);
    assert_eq!(outcome.data_source, DataSource::Live);
    assert_eq!(outcome.city, "Pune");
    assert!(outcome.advice.contains("PM2.5=6.12"));
    assert!(outcome.advice.contains("PM10=6.87"));
    assert!(outcome.advice.contains("Temperature=26.34°C"));
    assert!(outcome.advice.contains("Humidity=71%"));
    assert!(outcome.advice.contains("Moderate risk detected"));
    assert!(outcome.advice.contains("Main contributing factors"));

    let report = outcome.explanation.report().unwrap();
    assert!(report.additive.is_some());
    assert!(report.surrogate.is_some());
    assert_eq!(outcome.seed, 42);
    assert_eq!(outcome.model_digest, pipeline.model().metadata.digest);
}

#[tokio::test]
async fn test_provider_recovers_after_two_timeouts() {
    let config = common::test_config();
    let pipeline = PredictionPipeline::from_config(
        common::forest(),
        SlowProvider::new(2, Duration::from_millis(config.fetch.timeout_ms * 5)),
        &config,
    );

    let outcome = pipeline
        .predict(PredictionRequest::new("Pune", common::pune_profile()).without_explanation())
        .await
        .unwrap();

    assert_eq!(outcome.data_source, DataSource::Live);
    assert_eq!(outcome.prediction.label, RiskLevel::Moderate);
}

#[tokio::test]
async fn test_provider_timing_out_every_attempt_fails() {
    let config = common::test_config();
    let pipeline = PredictionPipeline::from_config(
        common::forest(),
        SlowProvider::new(usize::MAX, Duration::from_millis(config.fetch.timeout_ms * 5)),
        &config,
    );

    let err = pipeline
        .predict(PredictionRequest::new("Pune", common::pune_profile()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::DataFetch(DataFetchError::Exhausted { attempts: 3, .. })
    ));
}

#[tokio::test]
async fn test_explanation_timeout_keeps_label() {
    let mut config = common::test_config();
    config.explanation.budget_ms = 0;
    let pipeline = PredictionPipeline::from_config(
        common::forest(),
        FixedProvider::new(common::pune_measurements()),
        &config,
    );

    let outcome = pipeline
        .predict(PredictionRequest::new("Pune", common::pune_profile()))
        .await
        .unwrap();

    assert_eq!(outcome.prediction.label, RiskLevel::Moderate);
    assert!(outcome.explanation.is_unavailable());
    assert!(outcome.advice.contains("Moderate risk detected"));
    assert!(!outcome.advice.contains("Main contributing factors"));
}

#[tokio::test]
async fn test_unknown_location_is_not_retried() {
    let pipeline = pune_pipeline();
    let err = pipeline
        .predict(PredictionRequest::new("Atlantis", common::pune_profile()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        PipelineError::DataFetch(DataFetchError::LocationNotFound(_))
    ));
}

#[tokio::test]
async fn test_blank_city_rejected_before_fetch() {
    let provider = FixedProvider::new(common::pune_measurements());
    let pipeline =
        PredictionPipeline::from_config(common::forest(), provider, &common::test_config());

    let err = pipeline
        .predict(PredictionRequest::new("   ", common::pune_profile()))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[tokio::test]
async fn test_explicit_seed_is_reported() {
    let pipeline = pune_pipeline();
    let request = PredictionRequest::new("Pune", common::pune_profile()).with_seed(7);
    let first = pipeline.predict(request.clone()).await.unwrap();
    let second = pipeline.predict(request).await.unwrap();

    assert_eq!(first.seed, 7);
    assert_eq!(first.explanation, second.explanation);
    assert_ne!(first.prediction_id, second.prediction_id);
}

// ============================================================================
// Adherence Boundaries
// ============================================================================

#[tokio::test]
async fn test_adherence_bounds_are_inclusive() {
    let pipeline = pune_pipeline();
    for adherence in [0.0, 1.0] {
        let request = PredictionRequest::new("Pune", PatientProfile::new(35, 2, adherence))
            .without_explanation();
        assert!(pipeline.predict(request).await.is_ok());
    }
}

#[tokio::test]
async fn test_adherence_above_one_rejected() {
    let pipeline = pune_pipeline();
    let err = pipeline
        .predict(PredictionRequest::new("Pune", PatientProfile::new(35, 2, 1.5)))
        .await
        .unwrap_err();

    match err {
        PipelineError::Validation(e) => assert_eq!(e.field(), "medication_adherence"),
        other => panic!("expected validation error, got {other:?}"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_adherence_outside_unit_interval_rejected(
        adherence in prop_oneof![-10.0..-1e-6f64, 1.000001..10.0f64]
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let pipeline = pune_pipeline();
        let result = runtime.block_on(pipeline.predict(
            PredictionRequest::new("Pune", PatientProfile::new(35, 2, adherence)).without_explanation(),
        ));
        prop_assert!(
            matches!(result, Err(PipelineError::Validation(ValidationError::OutOfRange { .. }))),
            "unexpected result for {}",
            adherence
        );
    }
}
