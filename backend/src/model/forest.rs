//! Random-forest classifier

use serde::Deserialize;
use shared::{CLASS_COUNT, FEATURE_COUNT};

use super::{FeatureRow, ModelFamily, ModelUnavailableError, RiskModel};

/// One node of a flattened decision tree
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreeNode {
    /// Go to `left` when `x[feature] <= threshold`, otherwise `right`
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Class distribution at the end of a path
    Leaf { value: [f64; CLASS_COUNT] },
}

/// Decision tree stored as a node array rooted at index 0
#[derive(Debug, Clone)]
pub struct DecisionTree {
    nodes: Vec<TreeNode>,
}

impl DecisionTree {
    /// Validate structure and renormalise leaf distributions
    ///
    /// Children must point strictly forward, so every path terminates in a leaf.
    pub fn new(mut nodes: Vec<TreeNode>) -> Result<Self, ModelUnavailableError> {
        if nodes.is_empty() {
            return Err(ModelUnavailableError::Invalid("tree has no nodes".into()));
        }

        let len = nodes.len();
        for (index, node) in nodes.iter_mut().enumerate() {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= FEATURE_COUNT {
                        return Err(ModelUnavailableError::Invalid(format!(
                            "node {} splits on unknown feature {}",
                            index, feature
                        )));
                    }
                    if !threshold.is_finite() {
                        return Err(ModelUnavailableError::Invalid(format!(
                            "node {} has a non-finite threshold",
                            index
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= index || child >= len {
                            return Err(ModelUnavailableError::Invalid(format!(
                                "node {} has out-of-order child {}",
                                index, child
                            )));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if value.iter().any(|v| !v.is_finite() || *v < 0.0) {
                        return Err(ModelUnavailableError::Invalid(format!(
                            "leaf {} has an invalid class distribution",
                            index
                        )));
                    }
                    let total: f64 = value.iter().sum();
                    if total <= 0.0 {
                        return Err(ModelUnavailableError::Invalid(format!(
                            "leaf {} has an empty class distribution",
                            index
                        )));
                    }
                    for v in value.iter_mut() {
                        *v /= total;
                    }
                }
            }
        }

        Ok(Self { nodes })
    }

    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Class distribution of the leaf `x` lands in
    pub fn leaf_value(&self, x: &FeatureRow) -> &[f64; CLASS_COUNT] {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if x[*feature] <= *threshold { *left } else { *right };
                }
                TreeNode::Leaf { value } => return value,
            }
        }
    }
}

/// Averaging ensemble of decision trees
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    trees: Vec<DecisionTree>,
}

impl TreeEnsemble {
    pub fn new(trees: Vec<DecisionTree>) -> Result<Self, ModelUnavailableError> {
        if trees.is_empty() {
            return Err(ModelUnavailableError::Invalid("forest has no trees".into()));
        }
        Ok(Self { trees })
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl RiskModel for TreeEnsemble {
    fn family(&self) -> ModelFamily {
        ModelFamily::RandomForest
    }

    fn predict_proba(&self, x: &FeatureRow) -> [f64; CLASS_COUNT] {
        let mut proba = [0.0; CLASS_COUNT];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.leaf_value(x)) {
                *p += v;
            }
        }
        let n = self.trees.len() as f64;
        proba.map(|p| p / n)
    }

    fn margin(&self, x: &FeatureRow, class: usize) -> f64 {
        self.predict_proba(x)[class]
    }

    fn as_tree_ensemble(&self) -> Option<&TreeEnsemble> {
        Some(self)
    }
}
