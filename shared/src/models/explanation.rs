//! Feature attribution models

use serde::{Deserialize, Serialize};

use super::RiskLevel;
use crate::types::Feature;

/// How a set of attributions was computed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMethod {
    /// Shapley-style decomposition of the model's output margin
    Additive,
    /// Coefficients of a locally weighted linear surrogate
    LocalSurrogate,
}

/// Signed contribution of one feature
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureAttribution {
    pub feature: Feature,
    pub value: f64,
}

/// Per-feature explanation of one prediction
///
/// For [`AttributionMethod::Additive`], `baseline + sum(attributions)` equals
/// `output_margin`. For [`AttributionMethod::LocalSurrogate`], `baseline` is the
/// surrogate's intercept and `output_margin` the model's probability for `target`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub method: AttributionMethod,
    pub target: RiskLevel,
    pub baseline: f64,
    pub output_margin: f64,
    /// One entry per feature, in schema order
    pub attributions: Vec<FeatureAttribution>,
    /// Fraction of surrogate runs agreeing with the model's label
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fidelity: Option<f64>,
    /// Weighted R² of the surrogate fit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub low_confidence: bool,
    pub seed: u64,
}

/// Smallest additivity gap ever treated as a violation
pub const ADDITIVITY_FLOOR: f64 = 1e-9;

impl Explanation {
    pub fn attribution_sum(&self) -> f64 {
        self.attributions.iter().map(|a| a.value).sum()
    }

    /// `baseline + sum(attributions) - output_margin`
    pub fn additivity_gap(&self) -> f64 {
        self.baseline + self.attribution_sum() - self.output_margin
    }

    /// Check the additive invariant within a relative tolerance
    ///
    /// Margins within rounding noise of zero are compared against [`ADDITIVITY_FLOOR`].
    pub fn is_additive_within(&self, rel_tol: f64) -> bool {
        let allowed = (rel_tol * self.output_margin.abs()).max(ADDITIVITY_FLOOR);
        self.additivity_gap().abs() <= allowed
    }

    pub fn value_of(&self, feature: Feature) -> Option<f64> {
        self.attributions
            .iter()
            .find(|a| a.feature == feature)
            .map(|a| a.value)
    }

    /// The `n` largest attributions by magnitude
    pub fn top(&self, n: usize) -> Vec<FeatureAttribution> {
        let mut ranked = rank_attributions(&self.attributions);
        ranked.truncate(n);
        ranked
    }
}

/// Order attributions by descending magnitude
///
/// Equal magnitudes keep schema order (lower feature index first), so the
/// ranking is fully deterministic.
pub fn rank_attributions(attributions: &[FeatureAttribution]) -> Vec<FeatureAttribution> {
    let mut ranked = attributions.to_vec();
    ranked.sort_by(|a, b| {
        b.value
            .abs()
            .total_cmp(&a.value.abs())
            .then(a.feature.index().cmp(&b.feature.index()))
    });
    ranked
}
