//! Environmental data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Coordinates;

/// Point-in-time environmental conditions for a named location
///
/// Measurements the upstream provider did not report are `None`; the feature
/// builder rejects incomplete snapshots rather than guessing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvironmentalSnapshot {
    pub location: String,
    pub observed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    /// µg/m³
    pub pm25: Option<f64>,
    /// µg/m³
    pub pm10: Option<f64>,
    /// °C
    pub temperature: Option<f64>,
    /// percent, 0-100
    pub humidity: Option<f64>,
    /// hPa
    pub pressure: Option<f64>,
    /// m/s
    pub wind_speed: Option<f64>,
    /// index, 0-100
    pub pollen_level: Option<f64>,
}

/// Fully populated measurements, used to construct snapshots in tests and fixtures
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurements {
    pub pm25: f64,
    pub pm10: f64,
    pub temperature: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub pollen_level: f64,
}

impl EnvironmentalSnapshot {
    /// Snapshot with every measurement present
    pub fn complete(location: impl Into<String>, m: Measurements) -> Self {
        Self {
            location: location.into(),
            observed_at: Utc::now(),
            coordinates: None,
            pm25: Some(m.pm25),
            pm10: Some(m.pm10),
            temperature: Some(m.temperature),
            humidity: Some(m.humidity),
            pressure: Some(m.pressure),
            wind_speed: Some(m.wind_speed),
            pollen_level: Some(m.pollen_level),
        }
    }

    pub fn with_observed_at(mut self, observed_at: DateTime<Utc>) -> Self {
        self.observed_at = observed_at;
        self
    }

    /// Age of the observation relative to `now`, in whole seconds
    pub fn age_seconds(&self, now: DateTime<Utc>) -> i64 {
        (now - self.observed_at).num_seconds()
    }
}
