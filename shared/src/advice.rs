//! Advisory text for a risk prediction
//!
//! Output is a deterministic function of the prediction, the feature vector,
//! the patient profile and the explanation's top contributors.

use crate::models::{Explanation, FeatureAttribution, PatientProfile, RiskLevel, RiskPrediction};
use crate::types::{Feature, FeatureVector};

/// Default number of contributing features quoted in advice
pub const DEFAULT_TOP_FEATURES: usize = 3;

/// Composes templated guidance for patients
#[derive(Debug, Clone, Copy)]
pub struct AdviceComposer {
    top_n: usize,
}

impl Default for AdviceComposer {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_FEATURES,
        }
    }
}

impl AdviceComposer {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    pub fn compose(
        &self,
        prediction: &RiskPrediction,
        vector: &FeatureVector,
        profile: &PatientProfile,
        explanation: Option<&Explanation>,
    ) -> String {
        let mut advice = format!(
            "Air quality conditions: PM2.5={} μg/m³, PM10={} μg/m³, Temperature={}°C, Humidity={}%.",
            format_measure(vector.get(Feature::Pm25)),
            format_measure(vector.get(Feature::Pm10)),
            format_measure(vector.get(Feature::Temperature)),
            format_measure(vector.get(Feature::Humidity)),
        );

        advice.push_str(&format!(
            " Prediction confidence: {:.0}%.",
            prediction.confidence() * 100.0
        ));

        advice.push(' ');
        advice.push_str(&risk_guidance(prediction.label, profile));

        if let Some(explanation) = explanation {
            let top = explanation.top(self.top_n);
            if !top.is_empty() {
                advice.push(' ');
                advice.push_str(&contributors_sentence(&top));
            }
        }

        advice
    }
}

/// Tier-specific guidance with the patient's own risk factors
fn risk_guidance(label: RiskLevel, profile: &PatientProfile) -> String {
    let patient = format!(
        "Patient age: {} years, History of severe attacks: {}, Medication adherence: {}%.",
        profile.age,
        profile.history_severe_attacks,
        format_measure(profile.adherence_percent()),
    );

    match label {
        RiskLevel::High => format!(
            "High risk detected. Consider staying indoors during peak pollution hours. {} \
             Please consult your healthcare provider immediately.",
            patient
        ),
        RiskLevel::Moderate => format!(
            "Moderate risk detected. Limit outdoor activities during peak pollution hours. {} \
             Monitor your symptoms closely.",
            patient
        ),
        RiskLevel::Low => format!(
            "Low risk. Enjoy outdoor activities but stay hydrated. {} \
             Continue your regular routine.",
            patient
        ),
    }
}

fn contributors_sentence(top: &[FeatureAttribution]) -> String {
    let parts: Vec<String> = top
        .iter()
        .map(|a| format!("{} ({:+.3})", a.feature.label(), a.value))
        .collect();
    format!("Main contributing factors: {}.", parts.join(", "))
}

/// Render a measurement with at most two decimals, trailing zeros trimmed
pub fn format_measure(value: f64) -> String {
    let rendered = format!("{:.2}", value);
    let trimmed = rendered.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}
