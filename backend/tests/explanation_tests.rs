//! Explanation engine integration tests
//!
//! Covers additive efficiency, reproducibility under a fixed seed, surrogate
//! fidelity and the time budget against the shipped artifacts.

mod common;

use std::sync::Arc;

use asthma_shield_backend::config::{ExplanationConfig, ExplanationMode};
use asthma_shield_backend::model::LoadedModel;
use asthma_shield_backend::services::explanation::ADDITIVE_TOLERANCE;
use asthma_shield_backend::services::{ExplanationEngine, ExplanationError};
use proptest::prelude::*;
use shared::{AttributionMethod, Feature, FeatureVector, RiskLevel, FEATURE_COUNT};

fn engine(model: Arc<LoadedModel>, mode: ExplanationMode) -> ExplanationEngine {
    ExplanationEngine::new(
        model,
        ExplanationConfig {
            mode,
            budget_ms: 60_000,
            ..ExplanationConfig::default()
        },
    )
}

fn pune_vector() -> FeatureVector {
    FeatureVector::from_values([6.12, 6.87, 26.34, 71.0, 50.0, 3.88, 1010.0, 35.0, 2.0, 0.8])
}

fn severe_vector() -> FeatureVector {
    FeatureVector::from_values([350.0, 450.0, 33.0, 80.0, 85.0, 2.0, 1005.0, 70.0, 8.0, 0.3])
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_forest_additive_reconstructs_margin() {
        let engine = engine(common::forest(), ExplanationMode::Additive);
        let report = engine.explain(&pune_vector(), RiskLevel::Moderate, 42).unwrap();
        let additive = report.additive.unwrap();

        assert_eq!(additive.method, AttributionMethod::Additive);
        assert_eq!(additive.attributions.len(), FEATURE_COUNT);
        assert!((additive.output_margin - 0.46).abs() < 1e-9);
        assert!(additive.additivity_gap().abs() < 1e-9);
        assert!(report.surrogate.is_none());
    }

    #[test]
    fn test_logistic_pm25_pushes_toward_high() {
        let engine = engine(common::logistic(), ExplanationMode::Additive);
        let report = engine.explain(&severe_vector(), RiskLevel::High, 7).unwrap();
        let additive = report.additive.unwrap();

        assert!(additive.value_of(Feature::Pm25).unwrap() > 0.0);
        assert!(additive.is_additive_within(ADDITIVE_TOLERANCE));
    }

    #[test]
    fn test_same_seed_same_report() {
        for model in [common::forest(), common::logistic()] {
            let engine = engine(model, ExplanationMode::Both);
            let first = engine.explain(&pune_vector(), RiskLevel::Moderate, 1234).unwrap();
            let second = engine.explain(&pune_vector(), RiskLevel::Moderate, 1234).unwrap();
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_surrogate_agrees_with_model_on_clear_case() {
        let engine = engine(common::logistic(), ExplanationMode::Surrogate);
        let report = engine.explain(&severe_vector(), RiskLevel::High, 42).unwrap();
        let surrogate = report.surrogate.unwrap();

        assert_eq!(surrogate.method, AttributionMethod::LocalSurrogate);
        assert_eq!(surrogate.fidelity, Some(1.0));
        assert!(!surrogate.low_confidence);
        assert!(surrogate.score.is_some());
    }

    #[test]
    fn test_unreachable_fidelity_threshold_flags_low_confidence() {
        let engine = ExplanationEngine::new(
            common::forest(),
            ExplanationConfig {
                mode: ExplanationMode::Surrogate,
                budget_ms: 60_000,
                fidelity_threshold: 1.01,
                ..ExplanationConfig::default()
            },
        );
        let report = engine.explain(&severe_vector(), RiskLevel::High, 42).unwrap();
        assert!(report.surrogate.unwrap().low_confidence);
    }

    #[test]
    fn test_zero_budget_times_out() {
        let engine = ExplanationEngine::new(
            common::forest(),
            ExplanationConfig {
                budget_ms: 0,
                ..ExplanationConfig::default()
            },
        );
        let err = engine.explain(&pune_vector(), RiskLevel::Moderate, 42).unwrap_err();
        assert_eq!(err, ExplanationError::Timeout { budget_ms: 0 });
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let engine = engine(common::forest(), ExplanationMode::Additive);
        let vector = FeatureVector::with_schema_version(3, *pune_vector().values());
        let err = engine.explain(&vector, RiskLevel::Low, 42).unwrap_err();
        assert!(matches!(err, ExplanationError::SchemaViolation { expected: 1, found: 3 }));
    }

    #[test]
    fn test_global_importance_is_ranked() {
        let engine = engine(common::forest(), ExplanationMode::Additive);
        let importance = engine.global_importance().unwrap();

        assert_eq!(importance.len(), FEATURE_COUNT);
        assert!(importance.iter().all(|a| a.value >= 0.0));
        assert!(importance.windows(2).all(|w| w[0].value >= w[1].value));
    }

    #[tokio::test]
    async fn test_blocking_explanation_matches_inline() {
        let engine = engine(common::logistic(), ExplanationMode::Additive);
        let inline = engine.explain(&pune_vector(), RiskLevel::Low, 9).unwrap();
        let pooled = engine
            .explain_blocking(pune_vector(), RiskLevel::Low, 9)
            .await
            .unwrap();
        assert_eq!(inline, pooled);
    }
}

// ============================================================================
// Property Tests
// ============================================================================

fn feature_row() -> impl Strategy<Value = [f64; FEATURE_COUNT]> {
    (
        (0.0..500.0f64, 0.0..600.0f64, -10.0..45.0f64, 0.0..100.0f64, 0.0..100.0f64),
        (0.0..30.0f64, 950.0..1050.0f64, 1..90i32, 0..10i32, 0.0..=1.0f64),
    )
        .prop_map(|((pm25, pm10, t, h, pollen), (wind, p, age, hist, adh))| {
            [pm25, pm10, t, h, pollen, wind, p, age as f64, hist as f64, adh]
        })
}

fn risk_level() -> impl Strategy<Value = RiskLevel> {
    prop_oneof![
        Just(RiskLevel::Low),
        Just(RiskLevel::Moderate),
        Just(RiskLevel::High),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_additive_efficiency(values in feature_row(), target in risk_level(), seed in any::<u64>()) {
        let vector = FeatureVector::from_values(values);
        for model in [common::forest(), common::logistic()] {
            let report = engine(model, ExplanationMode::Additive)
                .explain(&vector, target, seed)
                .unwrap();
            let additive = report.additive.unwrap();
            prop_assert!(
                additive.is_additive_within(ADDITIVE_TOLERANCE),
                "gap {}",
                additive.additivity_gap()
            );
        }
    }
}
