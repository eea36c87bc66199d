//! Random forest regression trainer.
//!
//! Each tree is grown on a bootstrap sample of the training rows:
//! - every split considers all features and picks the cut that most reduces
//!   the squared error of the two children
//! - cuts sit halfway between two adjacent distinct feature values
//! - growth stops at pure nodes, at `max_depth`, or when a split would leave
//!   fewer than `min_samples_leaf` rows on a side
//! - leaves predict the mean target of their rows
//!
//! Trees are written in the flat node layout evaluated by `models::Tree`
//! (children always after their parent). Tree `t` draws its bootstrap from
//! `seed + t`, so a given seed rebuilds the same forest on any thread count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use crate::features::FEATURE_COUNT;
use crate::models::{Forest, Tree, TreeNode};

#[derive(Debug, Clone, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    /// Unlimited when `None`.
    pub max_depth: Option<usize>,
    pub min_samples_leaf: usize,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 500,
            max_depth: None,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

/// Fit a forest on `x`/`y`. Both must be non-empty and of equal length.
pub fn fit_forest(x: &[[f64; FEATURE_COUNT]], y: &[f64], params: &ForestParams) -> Forest {
    let n = y.len();
    let trees = (0..params.n_trees.max(1))
        .into_par_iter()
        .map(|t| {
            let mut rng = StdRng::seed_from_u64(params.seed.wrapping_add(t as u64));
            let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
            grow_tree(x, y, sample, params)
        })
        .collect();
    Forest { trees }
}

struct Pending {
    samples: Vec<usize>,
    depth: usize,
    /// Parent node index and whether this is its left child.
    parent: Option<(usize, bool)>,
}

#[derive(Debug, Clone, Copy)]
struct Split {
    feature: usize,
    threshold: f64,
}

fn grow_tree(x: &[[f64; FEATURE_COUNT]], y: &[f64], samples: Vec<usize>, params: &ForestParams) -> Tree {
    let min_leaf = params.min_samples_leaf.max(1);
    let mut nodes: Vec<TreeNode> = Vec::new();
    let mut stack = vec![Pending {
        samples,
        depth: 0,
        parent: None,
    }];

    while let Some(node) = stack.pop() {
        let idx = nodes.len();
        if let Some((parent, is_left)) = node.parent {
            if let TreeNode::Split { left, right, .. } = &mut nodes[parent] {
                if is_left {
                    *left = idx;
                } else {
                    *right = idx;
                }
            }
        }

        let may_split = params.max_depth.is_none_or(|d| node.depth < d) && node.samples.len() >= 2 * min_leaf;
        let split = if may_split {
            best_split(x, y, &node.samples, min_leaf)
        } else {
            None
        };

        match split {
            Some(Split { feature, threshold }) => {
                // Children are linked once they are placed.
                nodes.push(TreeNode::Split {
                    feature,
                    threshold,
                    left: idx,
                    right: idx,
                });
                let (left, right): (Vec<usize>, Vec<usize>) = node
                    .samples
                    .into_iter()
                    .partition(|&i| x[i][feature] <= threshold);
                stack.push(Pending {
                    samples: right,
                    depth: node.depth + 1,
                    parent: Some((idx, false)),
                });
                stack.push(Pending {
                    samples: left,
                    depth: node.depth + 1,
                    parent: Some((idx, true)),
                });
            }
            None => nodes.push(TreeNode::Leaf {
                value: mean(y, &node.samples),
            }),
        }
    }
    Tree { nodes }
}

/// Best variance-reduction split, or `None` when no cut improves the node.
fn best_split(x: &[[f64; FEATURE_COUNT]], y: &[f64], samples: &[usize], min_leaf: usize) -> Option<Split> {
    let n = samples.len();
    let total: f64 = samples.iter().map(|&i| y[i]).sum();
    let total_sq: f64 = samples.iter().map(|&i| y[i] * y[i]).sum();
    let parent_score = total * total / n as f64;
    if total_sq - parent_score <= 1e-12 {
        return None;
    }

    // Minimizing child SSE == maximizing Σ sum²/count over the two children.
    let mut best: Option<(f64, Split)> = None;
    let mut order = samples.to_vec();
    for feature in 0..FEATURE_COUNT {
        order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));
        let mut left_sum = 0.0;
        for k in 0..n - 1 {
            left_sum += y[order[k]];
            let left_n = k + 1;
            let here = x[order[k]][feature];
            let next = x[order[k + 1]][feature];
            if here == next || left_n < min_leaf || n - left_n < min_leaf {
                continue;
            }
            let right_sum = total - left_sum;
            let score = left_sum * left_sum / left_n as f64 + right_sum * right_sum / (n - left_n) as f64;
            if best.as_ref().is_none_or(|(s, _)| score > *s) {
                let mid = here + (next - here) / 2.0;
                let threshold = if mid < next { mid } else { here };
                best = Some((score, Split { feature, threshold }));
            }
        }
    }

    best.filter(|(score, _)| *score - parent_score > 1e-12)
        .map(|(_, split)| split)
}

fn mean(y: &[f64], samples: &[usize]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().map(|&i| y[i]).sum::<f64>() / samples.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RegressionModel;

    fn row(a: f64, b: f64) -> [f64; FEATURE_COUNT] {
        let mut r = [0.0; FEATURE_COUNT];
        r[0] = a;
        r[1] = b;
        r
    }

    fn step_data() -> (Vec<[f64; FEATURE_COUNT]>, Vec<f64>) {
        let x: Vec<_> = (0..40).map(|i| row(i as f64, (i % 3) as f64)).collect();
        let y: Vec<f64> = (0..40).map(|i| if i < 20 { 2.0 } else { 9.0 }).collect();
        (x, y)
    }

    fn params(n_trees: usize) -> ForestParams {
        ForestParams {
            n_trees,
            ..ForestParams::default()
        }
    }

    #[test]
    fn single_tree_without_bootstrap_noise_learns_a_step() {
        let (x, y) = step_data();
        let tree = grow_tree(&x, &y, (0..x.len()).collect(), &params(1));
        assert_eq!(tree.nodes.len(), 3);
        match tree.nodes[0] {
            TreeNode::Split { feature, threshold, .. } => {
                assert_eq!(feature, 0);
                assert_eq!(threshold, 19.5);
            }
            TreeNode::Leaf { .. } => panic!("root should split"),
        }
    }

    #[test]
    fn forest_predicts_both_sides_of_the_step() {
        let (x, y) = step_data();
        let forest = RegressionModel::Forest(fit_forest(&x, &y, &params(50)));
        forest.validate().unwrap();

        let low = crate::features::FeatureVector {
            gmv: 3.0,
            users: 0.0,
            marketing_cost: 0.0,
            day_of_week: 0,
            day_of_month: 1,
            is_weekend: false,
            month: 1,
            gmv_7d_avg: 0.0,
            users_7d_avg: 0.0,
            marketing_7d_avg: 0.0,
        };
        let high = crate::features::FeatureVector { gmv: 35.0, ..low };
        let out = forest.predict_rows(&[low, high]);
        assert!((out[0] - 2.0).abs() < 0.5, "{out:?}");
        assert!((out[1] - 9.0).abs() < 0.5, "{out:?}");
    }

    #[test]
    fn children_always_follow_their_parent() {
        let x: Vec<_> = (0..60).map(|i| row((i * 7 % 13) as f64, (i % 5) as f64)).collect();
        let y: Vec<f64> = (0..60).map(|i| ((i * 31) % 17) as f64).collect();
        let forest = fit_forest(&x, &y, &params(10));
        for tree in &forest.trees {
            for (idx, node) in tree.nodes.iter().enumerate() {
                if let TreeNode::Split { left, right, .. } = *node {
                    assert!(left > idx && right > idx && left != right);
                }
            }
        }
        RegressionModel::Forest(forest).validate().unwrap();
    }

    #[test]
    fn same_seed_same_forest() {
        let x: Vec<_> = (0..30).map(|i| row(i as f64, (i * 11 % 7) as f64)).collect();
        let y: Vec<f64> = (0..30).map(|i| ((i * 13) % 9) as f64).collect();
        assert_eq!(fit_forest(&x, &y, &params(8)), fit_forest(&x, &y, &params(8)));
        let other = ForestParams {
            seed: 7,
            ..params(8)
        };
        assert_ne!(fit_forest(&x, &y, &params(8)), fit_forest(&x, &y, &other));
    }

    #[test]
    fn depth_and_leaf_size_limit_growth() {
        let (x, y) = step_data();
        let stump = ForestParams {
            max_depth: Some(0),
            ..params(1)
        };
        let tree = grow_tree(&x, &y, (0..x.len()).collect(), &stump);
        assert_eq!(tree.nodes, vec![TreeNode::Leaf { value: 5.5 }]);

        let wide_leaves = ForestParams {
            min_samples_leaf: 25,
            ..params(1)
        };
        let tree = grow_tree(&x, &y, (0..x.len()).collect(), &wide_leaves);
        assert_eq!(tree.nodes.len(), 1);
    }

    #[test]
    fn constant_target_is_a_single_leaf() {
        let x: Vec<_> = (0..10).map(|i| row(i as f64, 0.0)).collect();
        let y = vec![4.0; 10];
        let tree = grow_tree(&x, &y, (0..10).collect(), &params(1));
        assert_eq!(tree.nodes, vec![TreeNode::Leaf { value: 4.0 }]);
    }
}
