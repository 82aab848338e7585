//! Feature vector assembly
//!
//! Merges an environmental snapshot and a patient profile into the fixed-order
//! vector described by [`FEATURE_SCHEMA`].

use crate::models::{EnvironmentalSnapshot, PatientProfile};
use crate::types::{Feature, FeatureVector, FEATURE_COUNT, FEATURE_SCHEMA};
use crate::validation::{
    require, validate_finite, validate_non_negative, validate_percentage, ValidationError,
};

/// Builds model inputs in schema order
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureVectorBuilder;

impl FeatureVectorBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Validate both inputs and lay them out as a feature vector
    pub fn build(
        &self,
        snapshot: &EnvironmentalSnapshot,
        profile: &PatientProfile,
    ) -> Result<FeatureVector, ValidationError> {
        profile.validate()?;

        let mut values = [0.0; FEATURE_COUNT];
        for feature in FEATURE_SCHEMA.features {
            values[feature.index()] = match feature {
                Feature::Pm25 => validate_non_negative("pm25", require("pm25", snapshot.pm25)?)?,
                Feature::Pm10 => validate_non_negative("pm10", require("pm10", snapshot.pm10)?)?,
                Feature::Temperature => {
                    validate_finite("temperature", require("temperature", snapshot.temperature)?)?
                }
                Feature::Humidity => {
                    validate_percentage("humidity", require("humidity", snapshot.humidity)?)?
                }
                Feature::PollenLevel => validate_percentage(
                    "pollen_level",
                    require("pollen_level", snapshot.pollen_level)?,
                )?,
                Feature::WindSpeed => validate_non_negative(
                    "wind_speed",
                    require("wind_speed", snapshot.wind_speed)?,
                )?,
                Feature::Pressure => {
                    validate_finite("pressure", require("pressure", snapshot.pressure)?)?
                }
                Feature::PatientAge => profile.age as f64,
                Feature::PatientHistorySevereAttacks => profile.history_severe_attacks as f64,
                Feature::MedicationAdherence => profile.medication_adherence,
            };
        }

        Ok(FeatureVector::from_values(values))
    }
}
