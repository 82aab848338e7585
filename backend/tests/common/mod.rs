//! Fixtures shared by the integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use asthma_shield_backend::config::Config;
use asthma_shield_backend::external::{EnvironmentalDataProvider, ProviderError};
use asthma_shield_backend::model::{load_artifact, LoadedModel};
use shared::{EnvironmentalSnapshot, Measurements, PatientProfile};

pub fn artifact_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("artifacts")
        .join(name)
}

pub fn forest() -> Arc<LoadedModel> {
    Arc::new(load_artifact(artifact_path("asthma_risk_forest.json")).unwrap())
}

pub fn logistic() -> Arc<LoadedModel> {
    Arc::new(load_artifact(artifact_path("asthma_risk_logistic.json")).unwrap())
}

/// Conditions observed in Pune on a clear day
pub fn pune_measurements() -> Measurements {
    Measurements {
        pm25: 6.12,
        pm10: 6.87,
        temperature: 26.34,
        humidity: 71.0,
        pressure: 1010.0,
        wind_speed: 3.88,
        pollen_level: 50.0,
    }
}

pub fn pune_profile() -> PatientProfile {
    PatientProfile::new(35, 2, 0.8)
}

/// Config with short network timings so retry tests finish quickly
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.fetch.timeout_ms = 100;
    config.fetch.max_retries = 2;
    config.fetch.backoff_base_ms = 1;
    config.fetch.backoff_max_ms = 5;
    config.explanation.budget_ms = 30_000;
    config.explanation.surrogate_samples = 300;
    config
}

/// Always reports the same measurements; `Atlantis` does not exist
pub struct FixedProvider {
    pub measurements: Measurements,
    pub calls: AtomicUsize,
}

impl FixedProvider {
    pub fn new(measurements: Measurements) -> Self {
        Self {
            measurements,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EnvironmentalDataProvider for FixedProvider {
    async fn fetch(&self, location: &str) -> Result<EnvironmentalSnapshot, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if location.eq_ignore_ascii_case("atlantis") {
            return Err(ProviderError::LocationNotFound(location.to_string()));
        }
        Ok(EnvironmentalSnapshot::complete(location, self.measurements))
    }
}

/// Hangs past the fetch timeout for the first `slow_calls` requests
pub struct SlowProvider {
    pub slow_calls: usize,
    pub delay: Duration,
    pub measurements: Measurements,
    pub calls: AtomicUsize,
}

impl SlowProvider {
    pub fn new(slow_calls: usize, delay: Duration) -> Self {
        Self {
            slow_calls,
            delay,
            measurements: pune_measurements(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EnvironmentalDataProvider for SlowProvider {
    async fn fetch(&self, location: &str) -> Result<EnvironmentalSnapshot, ProviderError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.slow_calls {
            tokio::time::sleep(self.delay).await;
        }
        Ok(EnvironmentalSnapshot::complete(location, self.measurements))
    }
}
