//! WebAssembly module for the AsthmaShield dashboard
//!
//! Provides client-side computation for:
//! - Patient and location input validation
//! - Feature vector preview
//! - Contributor ranking and advice rendering

use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

use shared::{AdviceComposer, FeatureVectorBuilder};

fn js_error(message: String) -> JsValue {
    JsValue::from_str(&message)
}

/// Feature names in model input order, as a JSON array
#[wasm_bindgen]
pub fn feature_names() -> String {
    serde_json::to_string(&FEATURE_SCHEMA.names()).unwrap_or_else(|_| "[]".to_string())
}

#[wasm_bindgen]
pub fn feature_schema_version() -> u32 {
    FEATURE_SCHEMA.version
}

/// Validate a patient profile; throws the first problem found
#[wasm_bindgen]
pub fn validate_patient(age: i32, history_severe_attacks: i32, adherence: f64) -> Result<(), JsValue> {
    check_patient(age, history_severe_attacks, adherence).map_err(js_error)
}

fn check_patient(age: i32, history_severe_attacks: i32, adherence: f64) -> Result<(), String> {
    PatientProfile::new(age, history_severe_attacks, adherence)
        .validate()
        .map_err(|e| e.to_string())
}

#[wasm_bindgen]
pub fn is_valid_city(city: &str) -> bool {
    validate_location_name(city).is_ok()
}

/// Build the model input vector from a snapshot JSON and a patient profile
///
/// Returns the ten values as a JSON array.
#[wasm_bindgen]
pub fn build_feature_vector(
    snapshot_json: &str,
    age: i32,
    history_severe_attacks: i32,
    adherence: f64,
) -> Result<String, JsValue> {
    feature_vector_json(snapshot_json, age, history_severe_attacks, adherence).map_err(js_error)
}

fn feature_vector_json(
    snapshot_json: &str,
    age: i32,
    history_severe_attacks: i32,
    adherence: f64,
) -> Result<String, String> {
    let snapshot: EnvironmentalSnapshot = serde_json::from_str(snapshot_json)
        .map_err(|e| format!("Invalid snapshot JSON: {}", e))?;
    let profile = PatientProfile::new(age, history_severe_attacks, adherence);
    let vector = FeatureVectorBuilder::new()
        .build(&snapshot, &profile)
        .map_err(|e| e.to_string())?;
    serde_json::to_string(vector.values()).map_err(|e| e.to_string())
}

/// Top `n` contributors of an explanation JSON, largest magnitude first
#[wasm_bindgen]
pub fn top_contributors(explanation_json: &str, n: usize) -> Result<String, JsValue> {
    ranked_contributors(explanation_json, n).map_err(js_error)
}

fn ranked_contributors(explanation_json: &str, n: usize) -> Result<String, String> {
    let explanation: Explanation = serde_json::from_str(explanation_json)
        .map_err(|e| format!("Invalid explanation JSON: {}", e))?;
    serde_json::to_string(&explanation.top(n)).map_err(|e| e.to_string())
}

/// Render advice for a prediction exactly as the service does
#[wasm_bindgen]
pub fn compose_advice(
    prediction_json: &str,
    feature_values_json: &str,
    age: i32,
    history_severe_attacks: i32,
    adherence: f64,
    explanation_json: Option<String>,
) -> Result<String, JsValue> {
    render_advice(
        prediction_json,
        feature_values_json,
        PatientProfile::new(age, history_severe_attacks, adherence),
        explanation_json.as_deref(),
    )
    .map_err(js_error)
}

fn render_advice(
    prediction_json: &str,
    feature_values_json: &str,
    profile: PatientProfile,
    explanation_json: Option<&str>,
) -> Result<String, String> {
    let prediction: RiskPrediction = serde_json::from_str(prediction_json)
        .map_err(|e| format!("Invalid prediction JSON: {}", e))?;
    let values: [f64; FEATURE_COUNT] = serde_json::from_str(feature_values_json)
        .map_err(|e| format!("Invalid feature values: {}", e))?;
    let explanation: Option<Explanation> = explanation_json
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| format!("Invalid explanation JSON: {}", e))?;

    Ok(AdviceComposer::default().compose(
        &prediction,
        &FeatureVector::from_values(values),
        &profile,
        explanation.as_ref(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUNE_SNAPSHOT: &str = r#"{
        "location": "Pune",
        "observed_at": "2024-06-01T09:00:00Z",
        "pm25": 6.12, "pm10": 6.87, "temperature": 26.34, "humidity": 71.0,
        "pressure": 1010.0, "wind_speed": 3.88, "pollen_level": 50.0
    }"#;

    #[test]
    fn test_feature_names_in_schema_order() {
        let names: Vec<String> = serde_json::from_str(&feature_names()).unwrap();
        assert_eq!(names.len(), FEATURE_COUNT);
        assert_eq!(names[0], "pm25");
        assert_eq!(names[9], "medication_adherence");
    }

    #[test]
    fn test_patient_validation() {
        assert!(check_patient(35, 2, 0.8).is_ok());
        assert!(check_patient(35, 2, 1.0).is_ok());
        assert!(check_patient(0, 2, 0.8).is_err());
        assert!(check_patient(35, -1, 0.8).is_err());
        assert!(check_patient(35, 2, 1.5).unwrap_err().contains("medication_adherence"));
    }

    #[test]
    fn test_city_validation() {
        assert!(is_valid_city("Pune"));
        assert!(!is_valid_city("   "));
    }

    #[test]
    fn test_feature_vector_preview() {
        let json = feature_vector_json(PUNE_SNAPSHOT, 35, 2, 0.8).unwrap();
        let values: Vec<f64> = serde_json::from_str(&json).unwrap();
        assert_eq!(values, vec![6.12, 6.87, 26.34, 71.0, 50.0, 3.88, 1010.0, 35.0, 2.0, 0.8]);
    }

    #[test]
    fn test_feature_vector_rejects_missing_measurement() {
        let snapshot = r#"{"location": "Pune", "observed_at": "2024-06-01T09:00:00Z", "pm25": 6.12}"#;
        let err = feature_vector_json(snapshot, 35, 2, 0.8).unwrap_err();
        assert!(err.contains("pm10"));
    }

    #[test]
    fn test_advice_matches_service_wording() {
        let prediction = r#"{"label": "Moderate", "probabilities": {"Low": 0.39, "Moderate": 0.46, "High": 0.15}}"#;
        let values = "[6.12, 6.87, 26.34, 71.0, 50.0, 3.88, 1010.0, 35.0, 2.0, 0.8]";
        let advice = render_advice(prediction, values, PatientProfile::new(35, 2, 0.8), None).unwrap();

        assert!(advice.contains("PM2.5=6.12"));
        assert!(advice.contains("Moderate risk detected"));
        assert!(advice.contains("Prediction confidence: 46%"));
    }
}
