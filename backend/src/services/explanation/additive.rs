//! Interventional Shapley attributions
//!
//! The value of a coalition S is the model margin on a hybrid row that takes
//! features in S from the instance and the rest from a background row. The
//! baseline is the mean margin over the background set, so for every row
//! `baseline + sum(phi) == margin(x)`.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use shared::{AttributionMethod, Explanation, RiskLevel, FEATURE_COUNT};

use super::{to_attributions, Deadline, ExplanationError};
use crate::model::{FeatureRow, LoadedModel, RiskModel, TreeEnsemble, TreeNode};

/// Additive attribution of `target`'s margin at `x`
///
/// Tree ensembles use the exact path algorithm; other families use antithetic
/// permutation sampling seeded by `seed`.
pub fn additive_attribution(
    model: &LoadedModel,
    x: &FeatureRow,
    target: RiskLevel,
    seed: u64,
    permutations: usize,
    deadline: &Deadline,
) -> Result<Explanation, ExplanationError> {
    let risk_model = model.risk_model();
    let class = target.index();

    let phi = match risk_model.as_tree_ensemble() {
        Some(forest) => tree_shap(forest, x, &model.background, class, deadline)?,
        None => sampled_shap(
            risk_model,
            x,
            &model.background,
            class,
            seed,
            permutations,
            deadline,
        )?,
    };

    let baseline = model
        .background
        .iter()
        .map(|row| risk_model.margin(row, class))
        .sum::<f64>()
        / model.background.len() as f64;

    Ok(Explanation {
        method: AttributionMethod::Additive,
        target,
        baseline,
        output_margin: risk_model.margin(x, class),
        attributions: to_attributions(&phi),
        fidelity: None,
        score: None,
        low_confidence: false,
        seed,
    })
}

// ============================================================================
// Exact path algorithm for tree ensembles
// ============================================================================

/// Feature set as a bitmask over schema indices
type FeatureSet = u16;

fn factorials() -> [f64; FEATURE_COUNT + 1] {
    let mut table = [1.0; FEATURE_COUNT + 1];
    for n in 1..=FEATURE_COUNT {
        table[n] = table[n - 1] * n as f64;
    }
    table
}

struct PathWalk<'a> {
    nodes: &'a [TreeNode],
    x: &'a FeatureRow,
    reference: &'a FeatureRow,
    class: usize,
    fact: &'a [f64; FEATURE_COUNT + 1],
}

impl PathWalk<'_> {
    /// Visit every leaf reachable by mixing `x` and `reference`
    ///
    /// `toward_x` holds features whose split sent the path the way `x` goes
    /// while `reference` goes the other way; `toward_ref` the converse.
    fn walk(&self, index: usize, toward_x: FeatureSet, toward_ref: FeatureSet, phi: &mut FeatureRow) {
        match &self.nodes[index] {
            TreeNode::Leaf { value } => self.credit(value[self.class], toward_x, toward_ref, phi),
            TreeNode::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                let child = |go_left: bool| if go_left { *left } else { *right };
                let x_left = self.x[*feature] <= *threshold;
                let ref_left = self.reference[*feature] <= *threshold;
                let bit = (1 as FeatureSet) << *feature;

                if x_left == ref_left {
                    self.walk(child(x_left), toward_x, toward_ref, phi);
                } else if toward_x & bit != 0 {
                    self.walk(child(x_left), toward_x, toward_ref, phi);
                } else if toward_ref & bit != 0 {
                    self.walk(child(ref_left), toward_x, toward_ref, phi);
                } else {
                    self.walk(child(x_left), toward_x | bit, toward_ref, phi);
                    self.walk(child(ref_left), toward_x, toward_ref | bit, phi);
                }
            }
        }
    }

    fn credit(&self, value: f64, toward_x: FeatureSet, toward_ref: FeatureSet, phi: &mut FeatureRow) {
        let a = toward_x.count_ones() as usize;
        let b = toward_ref.count_ones() as usize;
        let total = self.fact[a + b];

        if a > 0 {
            let gain = value * self.fact[a - 1] * self.fact[b] / total;
            for (j, p) in phi.iter_mut().enumerate() {
                if toward_x & (1 << j) != 0 {
                    *p += gain;
                }
            }
        }
        if b > 0 {
            let loss = value * self.fact[a] * self.fact[b - 1] / total;
            for (j, p) in phi.iter_mut().enumerate() {
                if toward_ref & (1 << j) != 0 {
                    *p -= loss;
                }
            }
        }
    }
}

/// Exact interventional Shapley values of a forest's class probability
pub fn tree_shap(
    forest: &TreeEnsemble,
    x: &FeatureRow,
    background: &[FeatureRow],
    class: usize,
    deadline: &Deadline,
) -> Result<FeatureRow, ExplanationError> {
    let fact = factorials();
    let mut phi = [0.0; FEATURE_COUNT];

    for tree in forest.trees() {
        for reference in background {
            deadline.check()?;
            let walk = PathWalk {
                nodes: tree.nodes(),
                x,
                reference,
                class,
                fact: &fact,
            };
            walk.walk(0, 0, 0, &mut phi);
        }
    }

    let n = (forest.trees().len() * background.len()) as f64;
    Ok(phi.map(|p| p / n))
}

// ============================================================================
// Permutation sampling for other families
// ============================================================================

/// Sampled interventional Shapley values
///
/// Each permutation is paired with its reverse. Every permutation's marginal
/// contributions telescope to `margin(x) - margin(reference)`, so efficiency
/// holds for any sample count.
pub fn sampled_shap(
    model: &dyn RiskModel,
    x: &FeatureRow,
    background: &[FeatureRow],
    class: usize,
    seed: u64,
    permutations: usize,
    deadline: &Deadline,
) -> Result<FeatureRow, ExplanationError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let pairs = permutations.div_ceil(2).max(1);
    let mut order: Vec<usize> = (0..FEATURE_COUNT).collect();
    let mut phi = [0.0; FEATURE_COUNT];
    let mut walks = 0usize;

    for reference in background {
        for _ in 0..pairs {
            deadline.check()?;
            order.shuffle(&mut rng);
            accumulate_walk(model, x, reference, class, order.iter().copied(), &mut phi);
            accumulate_walk(model, x, reference, class, order.iter().rev().copied(), &mut phi);
            walks += 2;
        }
    }

    let n = walks as f64;
    Ok(phi.map(|p| p / n))
}

/// Switch features from `reference` to `x` in `order`, crediting each change
fn accumulate_walk(
    model: &dyn RiskModel,
    x: &FeatureRow,
    reference: &FeatureRow,
    class: usize,
    order: impl Iterator<Item = usize>,
    phi: &mut FeatureRow,
) {
    let mut hybrid = *reference;
    let mut previous = model.margin(&hybrid, class);
    for j in order {
        hybrid[j] = x[j];
        let current = model.margin(&hybrid, class);
        phi[j] += current - previous;
        previous = current;
    }
}
