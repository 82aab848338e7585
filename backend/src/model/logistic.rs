//! Multinomial logistic regression over standardised features

use serde::Deserialize;
use shared::{CLASS_COUNT, FEATURE_COUNT};

use super::{FeatureRow, ModelFamily, ModelUnavailableError, RiskModel};

/// Standardisation applied before the linear scores
#[derive(Debug, Clone, Deserialize)]
pub struct Scaler {
    pub mean: [f64; FEATURE_COUNT],
    pub scale: [f64; FEATURE_COUNT],
}

#[derive(Debug, Clone)]
pub struct LogisticModel {
    scaler: Scaler,
    coefficients: [[f64; FEATURE_COUNT]; CLASS_COUNT],
    intercepts: [f64; CLASS_COUNT],
}

impl LogisticModel {
    pub fn new(
        scaler: Scaler,
        coefficients: [[f64; FEATURE_COUNT]; CLASS_COUNT],
        intercepts: [f64; CLASS_COUNT],
    ) -> Result<Self, ModelUnavailableError> {
        if scaler.scale.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ModelUnavailableError::Invalid(
                "scaler scale must be positive".into(),
            ));
        }
        let all_finite = scaler.mean.iter().all(|v| v.is_finite())
            && coefficients.iter().flatten().all(|v| v.is_finite())
            && intercepts.iter().all(|v| v.is_finite());
        if !all_finite {
            return Err(ModelUnavailableError::Invalid(
                "logistic parameters must be finite".into(),
            ));
        }

        Ok(Self {
            scaler,
            coefficients,
            intercepts,
        })
    }

    /// Linear score per class
    pub fn logits(&self, x: &FeatureRow) -> [f64; CLASS_COUNT] {
        let mut z = self.intercepts;
        for j in 0..FEATURE_COUNT {
            let scaled = (x[j] - self.scaler.mean[j]) / self.scaler.scale[j];
            for (k, zk) in z.iter_mut().enumerate() {
                *zk += self.coefficients[k][j] * scaled;
            }
        }
        z
    }
}

fn softmax(z: [f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let max = z.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exp = z.map(|v| (v - max).exp());
    let total: f64 = exp.iter().sum();
    exp.map(|e| e / total)
}

impl RiskModel for LogisticModel {
    fn family(&self) -> ModelFamily {
        ModelFamily::LogisticRegression
    }

    fn predict_proba(&self, x: &FeatureRow) -> [f64; CLASS_COUNT] {
        softmax(self.logits(x))
    }

    fn margin(&self, x: &FeatureRow, class: usize) -> f64 {
        self.logits(x)[class]
    }
}
