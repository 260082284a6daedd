//! Regression trees fit to boosting residuals.
//!
//! Nodes live in a flat vector with the root at index 0. Every node records
//! how many training rows reached it; the attribution calibration falls back
//! on those counts where the background sample does not cover a branch.

use crate::features::FeatureVector;
use serde::{Deserialize, Serialize};

/// Minimum hessian mass used in a Newton leaf step.
const MIN_HESSIAN: f64 = 1e-12;

/// A tree node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Internal node: rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        gain: f64,
        n_samples: usize,
    },
    /// Terminal node carrying a margin increment.
    Leaf { value: f64, n_samples: usize },
}

impl TreeNode {
    /// Training rows that reached this node.
    pub fn n_samples(&self) -> usize {
        match self {
            TreeNode::Split { n_samples, .. } | TreeNode::Leaf { n_samples, .. } => *n_samples,
        }
    }
}

/// Growth limits for a single tree.
#[derive(Clone, Copy, Debug)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

/// Training inputs shared by every recursive call.
struct GrowContext<'a> {
    rows: &'a [FeatureVector],
    residuals: &'a [f64],
    hessians: &'a [f64],
    candidates: &'a [usize],
    params: TreeParams,
}

/// A single regression tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    /// Fit a tree on `indices`, splitting on residual MSE reduction and
    /// setting each leaf to the Newton step `Σr / Σh`.
    pub fn fit(
        rows: &[FeatureVector],
        residuals: &[f64],
        hessians: &[f64],
        indices: &[usize],
        candidates: &[usize],
        params: TreeParams,
    ) -> Self {
        let ctx = GrowContext {
            rows,
            residuals,
            hessians,
            candidates,
            params,
        };
        let mut nodes = Vec::new();
        grow(&ctx, indices, 0, &mut nodes);
        Self { nodes }
    }

    /// A tree that always returns `value`.
    #[cfg(test)]
    pub fn constant(value: f64, n_samples: usize) -> Self {
        Self {
            nodes: vec![TreeNode::Leaf { value, n_samples }],
        }
    }

    /// Raw leaf output for a sample.
    pub fn predict(&self, x: &[f64]) -> f64 {
        match &self.nodes[self.leaf_index(x)] {
            TreeNode::Leaf { value, .. } => *value,
            TreeNode::Split { .. } => 0.0,
        }
    }

    /// Node indices visited from the root to the sample's leaf.
    pub fn decision_path(&self, x: &[f64]) -> Vec<usize> {
        let mut path = vec![0];
        let mut idx = 0;
        while let TreeNode::Split {
            feature,
            threshold,
            left,
            right,
            ..
        } = &self.nodes[idx]
        {
            idx = if x[*feature] <= *threshold { *left } else { *right };
            path.push(idx);
        }
        path
    }

    fn leaf_index(&self, x: &[f64]) -> usize {
        self.decision_path(x).last().copied().unwrap_or(0)
    }

    /// All nodes, root first.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Depth of the deepest leaf.
    #[cfg(test)]
    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[TreeNode], idx: usize) -> usize {
            match &nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        depth_of(&self.nodes, 0)
    }

    /// Accumulate split gain per feature.
    pub fn add_gains(&self, gains: &mut [f64]) {
        for node in &self.nodes {
            if let TreeNode::Split { feature, gain, .. } = node {
                gains[*feature] += gain;
            }
        }
    }
}

fn newton_leaf(ctx: &GrowContext<'_>, indices: &[usize]) -> TreeNode {
    let r: f64 = indices.iter().map(|&i| ctx.residuals[i]).sum();
    let h: f64 = indices.iter().map(|&i| ctx.hessians[i]).sum();
    TreeNode::Leaf {
        value: r / h.max(MIN_HESSIAN),
        n_samples: indices.len(),
    }
}

fn grow(ctx: &GrowContext<'_>, indices: &[usize], depth: usize, nodes: &mut Vec<TreeNode>) -> usize {
    let idx = nodes.len();
    let splittable =
        depth < ctx.params.max_depth && indices.len() >= 2 * ctx.params.min_samples_leaf.max(1);

    let split = if splittable { best_split(ctx, indices) } else { None };

    let Some((feature, threshold, gain)) = split else {
        nodes.push(newton_leaf(ctx, indices));
        return idx;
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| ctx.rows[i].as_slice()[feature] <= threshold);

    // placeholder until the children are placed
    nodes.push(TreeNode::Leaf {
        value: 0.0,
        n_samples: indices.len(),
    });
    let left = grow(ctx, &left_rows, depth + 1, nodes);
    let right = grow(ctx, &right_rows, depth + 1, nodes);

    nodes[idx] = TreeNode::Split {
        feature,
        threshold,
        left,
        right,
        gain,
        n_samples: indices.len(),
    };
    idx
}

/// Best (feature, threshold, gain) by weighted residual MSE reduction.
fn best_split(ctx: &GrowContext<'_>, indices: &[usize]) -> Option<(usize, f64, f64)> {
    let n = indices.len();
    let min_leaf = ctx.params.min_samples_leaf.max(1);

    let total_sum: f64 = indices.iter().map(|&i| ctx.residuals[i]).sum();
    let total_sq: f64 = indices.iter().map(|&i| ctx.residuals[i].powi(2)).sum();
    let parent_sse = total_sq - total_sum * total_sum / n as f64;

    let mut best: Option<(usize, f64, f64)> = None;
    let mut pairs: Vec<(f64, f64)> = Vec::with_capacity(n);

    for &feature in ctx.candidates {
        pairs.clear();
        pairs.extend(
            indices
                .iter()
                .map(|&i| (ctx.rows[i].as_slice()[feature], ctx.residuals[i])),
        );
        pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left_sum = 0.0;
        let mut left_sq = 0.0;

        for k in 0..n - 1 {
            left_sum += pairs[k].1;
            left_sq += pairs[k].1 * pairs[k].1;
            let left_n = k + 1;
            let right_n = n - left_n;

            if pairs[k].0 == pairs[k + 1].0 || left_n < min_leaf || right_n < min_leaf {
                continue;
            }

            let right_sum = total_sum - left_sum;
            let right_sq = total_sq - left_sq;
            let left_sse = left_sq - left_sum * left_sum / left_n as f64;
            let right_sse = right_sq - right_sum * right_sum / right_n as f64;
            let gain = parent_sse - left_sse - right_sse;

            if gain > best.map_or(1e-12, |b| b.2) {
                best = Some((feature, (pairs[k].0 + pairs[k + 1].0) / 2.0, gain));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Feature;

    fn step_data() -> (Vec<FeatureVector>, Vec<f64>) {
        let rows: Vec<FeatureVector> = (0..40)
            .map(|i| FeatureVector::zeros().with(Feature::LatePayments12m, i as f64))
            .collect();
        let residuals = (0..40).map(|i| if i < 20 { -0.5 } else { 0.5 }).collect();
        (rows, residuals)
    }

    #[test]
    fn test_fit_finds_step() {
        let (rows, residuals) = step_data();
        let hessians = vec![0.25; 40];
        let indices: Vec<usize> = (0..40).collect();
        let tree = RegressionTree::fit(
            &rows,
            &residuals,
            &hessians,
            &indices,
            &[Feature::LatePayments12m.index()],
            TreeParams {
                max_depth: 3,
                min_samples_leaf: 5,
            },
        );

        match &tree.nodes()[0] {
            TreeNode::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, Feature::LatePayments12m.index());
                assert!((threshold - 19.5).abs() < 1e-12);
            }
            other => panic!("expected split, got {:?}", other),
        }
        // Newton step: -0.5 / 0.25
        assert!((tree.predict(rows[0].as_slice()) + 2.0).abs() < 1e-12);
        assert!((tree.predict(rows[39].as_slice()) - 2.0).abs() < 1e-12);
        assert_eq!(tree.depth(), 1);
    }

    #[test]
    fn test_min_samples_leaf_blocks_split() {
        let (rows, residuals) = step_data();
        let hessians = vec![0.25; 40];
        let indices: Vec<usize> = (0..40).collect();
        let tree = RegressionTree::fit(
            &rows,
            &residuals,
            &hessians,
            &indices,
            &[Feature::LatePayments12m.index()],
            TreeParams {
                max_depth: 3,
                min_samples_leaf: 21,
            },
        );
        assert_eq!(tree.nodes().len(), 1);
        assert_eq!(tree.nodes()[0].n_samples(), 40);
    }

    #[test]
    fn test_decision_path_and_gains() {
        let (rows, residuals) = step_data();
        let hessians = vec![0.25; 40];
        let indices: Vec<usize> = (0..40).collect();
        let tree = RegressionTree::fit(
            &rows,
            &residuals,
            &hessians,
            &indices,
            &[Feature::LatePayments12m.index()],
            TreeParams {
                max_depth: 1,
                min_samples_leaf: 1,
            },
        );
        assert_eq!(tree.decision_path(rows[0].as_slice()).len(), 2);

        let mut gains = vec![0.0; crate::features::FEATURE_COUNT];
        tree.add_gains(&mut gains);
        assert!(gains[Feature::LatePayments12m.index()] > 0.0);
        assert_eq!(gains[Feature::Age.index()], 0.0);
    }

    #[test]
    fn test_constant_tree() {
        let tree = RegressionTree::constant(0.7, 10);
        assert_eq!(tree.predict(&[0.0; 27]), 0.7);
        assert_eq!(tree.depth(), 0);
    }
}
