//! Patient risk factor models

use serde::{Deserialize, Serialize};

use crate::validation::{validate_min_i32, validate_unit_interval, ValidationError};

/// Patient-specific risk factors supplied with each prediction request
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PatientProfile {
    /// Years, must be positive
    pub age: i32,
    /// Number of past severe attacks, non-negative
    pub history_severe_attacks: i32,
    /// Fraction of prescribed doses taken, 0.0 to 1.0 inclusive
    pub medication_adherence: f64,
}

impl PatientProfile {
    pub fn new(age: i32, history_severe_attacks: i32, medication_adherence: f64) -> Self {
        Self {
            age,
            history_severe_attacks,
            medication_adherence,
        }
    }

    /// Validate the ranges the model was trained on
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_min_i32("patient_age", self.age, 1)?;
        validate_min_i32("patient_history_severe_attacks", self.history_severe_attacks, 0)?;
        validate_unit_interval("medication_adherence", self.medication_adherence)?;
        Ok(())
    }

    /// Adherence as a whole percentage for display
    pub fn adherence_percent(&self) -> f64 {
        (self.medication_adherence * 100.0).round()
    }
}
