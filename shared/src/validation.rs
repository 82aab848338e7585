//! Validation utilities for prediction inputs
//!
//! Ranges here are the ones the risk models were trained on. Values inside a
//! range but far from the training data are accepted; only impossible or
//! missing values are rejected.

use thiserror::Error;

/// Caller input that cannot be turned into a feature vector
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is missing")]
    Missing { field: &'static str },

    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field} must be at least {min}, got {value}")]
    BelowMinimum {
        field: &'static str,
        value: f64,
        min: f64,
    },

    #[error("{field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ValidationError {
    /// Name of the offending input field
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::Missing { field }
            | ValidationError::NotFinite { field }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::BelowMinimum { field, .. }
            | ValidationError::Invalid { field, .. } => field,
        }
    }
}

// ============================================================================
// Numeric Validations
// ============================================================================

/// Unwrap a measurement that must be present
pub fn require(field: &'static str, value: Option<f64>) -> Result<f64, ValidationError> {
    value.ok_or(ValidationError::Missing { field })
}

/// Reject NaN and infinities
pub fn validate_finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NotFinite { field })
    }
}

/// Finite and `>= 0`
pub fn validate_non_negative(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    validate_finite(field, value)?;
    if value < 0.0 {
        return Err(ValidationError::BelowMinimum {
            field,
            value,
            min: 0.0,
        });
    }
    Ok(value)
}

/// Finite and within `[min, max]`, bounds inclusive
pub fn validate_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<f64, ValidationError> {
    validate_finite(field, value)?;
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(value)
}

/// Within `[0, 1]`, bounds inclusive
pub fn validate_unit_interval(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    validate_range(field, value, 0.0, 1.0)
}

/// Within `[0, 100]`, bounds inclusive
pub fn validate_percentage(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    validate_range(field, value, 0.0, 100.0)
}

pub fn validate_min_i32(field: &'static str, value: i32, min: i32) -> Result<i32, ValidationError> {
    if value < min {
        return Err(ValidationError::BelowMinimum {
            field,
            value: value as f64,
            min: min as f64,
        });
    }
    Ok(value)
}

// ============================================================================
// Text Validations
// ============================================================================

/// Validate a location name passed to the environmental provider
pub fn validate_location_name(location: &str) -> Result<(), ValidationError> {
    let trimmed = location.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Missing { field: "city" });
    }
    if trimmed.chars().count() > 100 {
        return Err(ValidationError::Invalid {
            field: "city",
            message: "must be at most 100 characters".to_string(),
        });
    }
    if trimmed.chars().any(|c| c.is_control()) {
        return Err(ValidationError::Invalid {
            field: "city",
            message: "must not contain control characters".to_string(),
        });
    }
    Ok(())
}
