//! Feature schema and common types used across the platform

use serde::{Deserialize, Serialize};

/// Number of features consumed by every risk model
pub const FEATURE_COUNT: usize = 10;

/// Number of risk classes (Low, Moderate, High)
pub const CLASS_COUNT: usize = 3;

/// A single model input
///
/// Discriminants are the feature's position in [`FEATURE_SCHEMA`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Pm25 = 0,
    Pm10 = 1,
    Temperature = 2,
    Humidity = 3,
    PollenLevel = 4,
    WindSpeed = 5,
    Pressure = 6,
    PatientAge = 7,
    PatientHistorySevereAttacks = 8,
    MedicationAdherence = 9,
}

impl Feature {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        FEATURE_SCHEMA.features.get(index).copied()
    }

    /// Column name used by trained artifacts and API payloads
    pub fn name(self) -> &'static str {
        match self {
            Feature::Pm25 => "pm25",
            Feature::Pm10 => "pm10",
            Feature::Temperature => "temperature",
            Feature::Humidity => "humidity",
            Feature::PollenLevel => "pollen_level",
            Feature::WindSpeed => "wind_speed",
            Feature::Pressure => "pressure",
            Feature::PatientAge => "patient_age",
            Feature::PatientHistorySevereAttacks => "patient_history_severe_attacks",
            Feature::MedicationAdherence => "medication_adherence",
        }
    }

    /// Human-readable label for advice text
    pub fn label(self) -> &'static str {
        match self {
            Feature::Pm25 => "PM2.5",
            Feature::Pm10 => "PM10",
            Feature::Temperature => "Temperature",
            Feature::Humidity => "Humidity",
            Feature::PollenLevel => "Pollen level",
            Feature::WindSpeed => "Wind speed",
            Feature::Pressure => "Pressure",
            Feature::PatientAge => "Patient age",
            Feature::PatientHistorySevereAttacks => "Severe attack history",
            Feature::MedicationAdherence => "Medication adherence",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-order feature schema
///
/// Every trained artifact records the schema version it was fitted against.
/// Changing the order or units of `features` requires bumping `version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub features: [Feature; FEATURE_COUNT],
}

/// The schema shared by the feature builder, the classifier and the explainer
pub const FEATURE_SCHEMA: FeatureSchema = FeatureSchema {
    version: 1,
    features: [
        Feature::Pm25,
        Feature::Pm10,
        Feature::Temperature,
        Feature::Humidity,
        Feature::PollenLevel,
        Feature::WindSpeed,
        Feature::Pressure,
        Feature::PatientAge,
        Feature::PatientHistorySevereAttacks,
        Feature::MedicationAdherence,
    ],
};

impl FeatureSchema {
    pub fn names(&self) -> [&'static str; FEATURE_COUNT] {
        self.features.map(Feature::name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f.name() == name)
    }

    /// Check that a list of column names matches this schema exactly, in order
    pub fn matches<S: AsRef<str>>(&self, names: &[S]) -> bool {
        names.len() == FEATURE_COUNT
            && names
                .iter()
                .zip(self.features.iter())
                .all(|(n, f)| n.as_ref() == f.name())
    }
}

/// Numeric model input in schema order, tagged with the schema version it was built for
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    schema_version: u32,
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    /// Wrap raw values laid out in the current schema's order
    pub fn from_values(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            schema_version: FEATURE_SCHEMA.version,
            values,
        }
    }

    pub fn with_schema_version(schema_version: u32, values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            schema_version,
            values,
        }
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.values[feature.index()]
    }

    /// Copy of this vector with one feature replaced
    pub fn with(&self, feature: Feature, value: f64) -> Self {
        let mut values = self.values;
        values[feature.index()] = value;
        Self {
            schema_version: self.schema_version,
            values,
        }
    }
}

/// Geographic coordinates reported by the environmental provider
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_discriminants_follow_schema_order() {
        for (i, feature) in FEATURE_SCHEMA.features.iter().enumerate() {
            assert_eq!(feature.index(), i);
            assert_eq!(Feature::from_index(i), Some(*feature));
        }
        assert_eq!(Feature::from_index(FEATURE_COUNT), None);
    }

    #[test]
    fn test_feature_names_match_serde() {
        for feature in FEATURE_SCHEMA.features {
            let json = serde_json::to_string(&feature).unwrap();
            assert_eq!(json, format!("\"{}\"", feature.name()));
        }
    }

    #[test]
    fn test_schema_matches() {
        let names = FEATURE_SCHEMA.names();
        assert!(FEATURE_SCHEMA.matches(&names));

        let mut swapped = names;
        swapped.swap(0, 1);
        assert!(!FEATURE_SCHEMA.matches(&swapped));
        assert!(!FEATURE_SCHEMA.matches(&names[..9]));
    }

    #[test]
    fn test_index_of() {
        assert_eq!(FEATURE_SCHEMA.index_of("pollen_level"), Some(4));
        assert_eq!(FEATURE_SCHEMA.index_of("ozone"), None);
    }

    #[test]
    fn test_vector_with_replaces_single_value() {
        let v = FeatureVector::from_values([1.0; FEATURE_COUNT]);
        let w = v.with(Feature::Pm25, 9.0);
        assert_eq!(w.get(Feature::Pm25), 9.0);
        assert_eq!(w.get(Feature::Pm10), 1.0);
        assert_eq!(w.schema_version(), FEATURE_SCHEMA.version);
    }
}
