//! Local surrogate attributions
//!
//! Perturbations are drawn in units of training standard deviations, so the
//! reported coefficients are the change in class probability per standard
//! deviation of each feature near the input.

use std::f64::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    AttributionMethod, ClassProbabilities, Explanation, RiskLevel, CLASS_COUNT, FEATURE_COUNT,
};

use super::{to_attributions, Deadline, ExplanationError};
use crate::model::{FeatureRow, LoadedModel, RiskModel};

/// Intercept plus one coefficient per feature
const TERMS: usize = FEATURE_COUNT + 1;

/// Perturbations between deadline checks
const CHECK_EVERY: usize = 32;

#[derive(Debug, Clone, Copy)]
pub struct SurrogateParams {
    pub samples: usize,
    pub runs: usize,
    pub radius: f64,
    pub kernel_width: f64,
    pub ridge: f64,
    pub fidelity_threshold: f64,
}

/// One fitted surrogate
#[derive(Debug, Clone)]
struct SurrogateFit {
    /// `[intercept, coefficients...]` per class
    beta: [[f64; TERMS]; CLASS_COUNT],
    /// Weighted R² for the target class
    score: f64,
}

impl SurrogateFit {
    fn label(&self) -> RiskLevel {
        ClassProbabilities::from_array(self.beta.map(|b| b[0])).most_likely()
    }
}

/// Seed for run `run`; run 0 uses the caller's seed unchanged
pub fn run_seed(seed: u64, run: usize) -> u64 {
    seed.wrapping_add((run as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15))
}

/// Fit `params.runs` surrogates around `x` and report averaged coefficients
pub fn surrogate_attribution(
    model: &LoadedModel,
    x: &FeatureRow,
    target: RiskLevel,
    seed: u64,
    params: &SurrogateParams,
    deadline: &Deadline,
) -> Result<Explanation, ExplanationError> {
    if params.kernel_width.is_nan() || params.kernel_width <= 0.0 {
        return Err(ExplanationError::Degenerate(
            "kernel width must be positive".into(),
        ));
    }

    let risk_model = model.risk_model();
    let runs = params.runs.max(1);
    let mut coefficients = [0.0; FEATURE_COUNT];
    let mut intercept = 0.0;
    let mut agreeing = 0usize;
    let mut score = None;

    for run in 0..runs {
        let fit = fit_once(
            risk_model,
            x,
            &model.feature_stats.std,
            target,
            run_seed(seed, run),
            params,
            deadline,
        )?;

        let class = target.index();
        intercept += fit.beta[class][0];
        for (c, b) in coefficients.iter_mut().zip(&fit.beta[class][1..]) {
            *c += b;
        }
        if fit.label() == target {
            agreeing += 1;
        }
        score.get_or_insert(fit.score);
    }

    let n = runs as f64;
    let fidelity = agreeing as f64 / n;
    let low_confidence = fidelity < params.fidelity_threshold;
    if low_confidence {
        tracing::warn!(
            fidelity,
            threshold = params.fidelity_threshold,
            "Local surrogate disagrees with the model"
        );
    }

    Ok(Explanation {
        method: AttributionMethod::LocalSurrogate,
        target,
        baseline: intercept / n,
        output_margin: risk_model.predict_proba(x)[target.index()],
        attributions: to_attributions(&coefficients.map(|c| c / n)),
        fidelity: Some(fidelity),
        score,
        low_confidence,
        seed,
    })
}

struct Sample {
    eps: FeatureRow,
    proba: [f64; CLASS_COUNT],
    weight: f64,
}

fn fit_once(
    model: &dyn RiskModel,
    x: &FeatureRow,
    std: &FeatureRow,
    target: RiskLevel,
    seed: u64,
    params: &SurrogateParams,
    deadline: &Deadline,
) -> Result<SurrogateFit, ExplanationError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let radius = params.radius.abs();
    let width_sq = params.kernel_width * params.kernel_width;
    let count = params.samples.max(1);
    let mut samples = Vec::with_capacity(count);

    for i in 0..count {
        if i % CHECK_EVERY == 0 {
            deadline.check()?;
        }
        let mut eps = [0.0; FEATURE_COUNT];
        if i > 0 {
            for e in eps.iter_mut() {
                *e = standard_normal(&mut rng).clamp(-radius, radius);
            }
        }
        let mut point = *x;
        for j in 0..FEATURE_COUNT {
            point[j] += std[j] * eps[j];
        }
        let distance_sq: f64 = eps.iter().map(|e| e * e).sum();
        samples.push(Sample {
            eps,
            proba: model.predict_proba(&point),
            weight: (-distance_sq / width_sq).exp(),
        });
    }

    // Normal equations of the weighted ridge problem; intercept unpenalised
    let mut gram = [[0.0; TERMS]; TERMS];
    let mut rhs = [[0.0; TERMS]; CLASS_COUNT];
    for sample in &samples {
        let z = design_row(&sample.eps);
        for a in 0..TERMS {
            let wz = sample.weight * z[a];
            for b in 0..TERMS {
                gram[a][b] += wz * z[b];
            }
            for k in 0..CLASS_COUNT {
                rhs[k][a] += wz * sample.proba[k];
            }
        }
    }
    for (j, row) in gram.iter_mut().enumerate().skip(1) {
        row[j] += params.ridge;
    }

    let beta = solve(gram, rhs)
        .ok_or_else(|| ExplanationError::Degenerate("normal equations are singular".into()))?;

    Ok(SurrogateFit {
        score: weighted_r2(&samples, &beta[target.index()], target.index()),
        beta,
    })
}

fn design_row(eps: &FeatureRow) -> [f64; TERMS] {
    let mut z = [1.0; TERMS];
    z[1..].copy_from_slice(eps);
    z
}

/// Box–Muller draw from N(0, 1)
fn standard_normal(rng: &mut StdRng) -> f64 {
    let u1 = 1.0 - rng.gen::<f64>();
    let u2 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

/// Solve `gram · beta_k = rhs_k` for every class by Gaussian elimination
/// with partial pivoting
fn solve(
    mut gram: [[f64; TERMS]; TERMS],
    mut rhs: [[f64; TERMS]; CLASS_COUNT],
) -> Option<[[f64; TERMS]; CLASS_COUNT]> {
    for col in 0..TERMS {
        let pivot = (col..TERMS).max_by(|&a, &b| gram[a][col].abs().total_cmp(&gram[b][col].abs()))?;
        if gram[pivot][col].abs() < 1e-12 {
            return None;
        }
        gram.swap(col, pivot);
        for r in rhs.iter_mut() {
            r.swap(col, pivot);
        }

        for row in col + 1..TERMS {
            let factor = gram[row][col] / gram[col][col];
            if factor == 0.0 {
                continue;
            }
            for c in col..TERMS {
                gram[row][c] -= factor * gram[col][c];
            }
            for r in rhs.iter_mut() {
                r[row] -= factor * r[col];
            }
        }
    }

    let mut beta = [[0.0; TERMS]; CLASS_COUNT];
    for (k, r) in rhs.iter().enumerate() {
        for row in (0..TERMS).rev() {
            let tail: f64 = (row + 1..TERMS).map(|c| gram[row][c] * beta[k][c]).sum();
            beta[k][row] = (r[row] - tail) / gram[row][row];
        }
    }
    Some(beta)
}

fn weighted_r2(samples: &[Sample], beta: &[f64; TERMS], class: usize) -> f64 {
    let total_weight: f64 = samples.iter().map(|s| s.weight).sum();
    let mean = samples.iter().map(|s| s.weight * s.proba[class]).sum::<f64>() / total_weight;

    let (mut residual, mut spread) = (0.0, 0.0);
    for sample in samples {
        let z = design_row(&sample.eps);
        let fitted: f64 = z.iter().zip(beta).map(|(a, b)| a * b).sum();
        residual += sample.weight * (sample.proba[class] - fitted).powi(2);
        spread += sample.weight * (sample.proba[class] - mean).powi(2);
    }

    if spread <= f64::EPSILON {
        1.0
    } else {
        1.0 - residual / spread
    }
}
