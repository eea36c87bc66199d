//! Regression models mapping feature vectors to raw pod estimates.
//!
//! Training lives in `fit`; here we only evaluate. Two model families are supported:
//!
//! - `Forest`: an averaged ensemble of binary regression trees (random forest)
//! - `Linear`: `intercept + Σ coefficient_i · x_i`
//!
//! Trees use the usual convention: go left when `x[feature] <= threshold`.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, EXIT_MODEL};
use crate::features::{FEATURE_COLUMNS, FEATURE_COUNT, FEATURE_SCHEMA_VERSION, FeatureVector};

/// Anything that turns feature rows into one raw estimate per row.
pub trait PodModel: Send + Sync {
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<f64>, AppError>;
}

/// Which pod count a model estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodTarget {
    #[serde(rename = "fe_pods")]
    Frontend,
    #[serde(rename = "be_pods")]
    Backend,
}

impl PodTarget {
    pub fn column(self) -> &'static str {
        match self {
            PodTarget::Frontend => "fe_pods",
            PodTarget::Backend => "be_pods",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

/// A single regression tree stored as a flat node list; node 0 is the root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    /// Check node references once so evaluation can walk without cycle guards.
    ///
    /// Children must point strictly forward, which also rules out cycles.
    fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (idx, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= FEATURE_COUNT {
                        return Err(format!("node {idx} splits on unknown feature {feature}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {idx} has a non-finite threshold"));
                    }
                    for child in [left, right] {
                        if child <= idx || child >= self.nodes.len() {
                            return Err(format!("node {idx} has invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {idx} has a non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }

    fn evaluate(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[feature] <= threshold { left } else { right },
                TreeNode::Leaf { value } => return value,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forest {
    pub trees: Vec<Tree>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    pub intercept: f64,
    /// One coefficient per feature, in `FEATURE_COLUMNS` order.
    pub coefficients: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RegressionModel {
    Forest(Forest),
    Linear(LinearModel),
}

impl RegressionModel {
    pub fn validate(&self) -> Result<(), String> {
        match self {
            RegressionModel::Forest(forest) => {
                if forest.trees.is_empty() {
                    return Err("forest has no trees".to_string());
                }
                for (idx, tree) in forest.trees.iter().enumerate() {
                    tree.validate().map_err(|e| format!("tree {idx}: {e}"))?;
                }
                Ok(())
            }
            RegressionModel::Linear(linear) => {
                if linear.coefficients.len() != FEATURE_COUNT {
                    return Err(format!(
                        "linear model has {} coefficients, expected {FEATURE_COUNT}",
                        linear.coefficients.len()
                    ));
                }
                if !linear.intercept.is_finite() || linear.coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("linear model has non-finite parameters".to_string());
                }
                Ok(())
            }
        }
    }

    /// Evaluate every row. The model must have passed [`RegressionModel::validate`].
    pub fn predict_rows(&self, features: &[FeatureVector]) -> Vec<f64> {
        features.iter().map(|f| self.predict_one(&f.to_array())).collect()
    }

    fn predict_one(&self, x: &[f64; FEATURE_COUNT]) -> f64 {
        match self {
            RegressionModel::Forest(forest) => {
                let total: f64 = forest.trees.iter().map(|t| t.evaluate(x)).sum();
                total / forest.trees.len() as f64
            }
            RegressionModel::Linear(linear) => {
                linear.intercept
                    + linear
                        .coefficients
                        .iter()
                        .zip(x.iter())
                        .map(|(c, v)| c * v)
                        .sum::<f64>()
            }
        }
    }
}

/// A persisted model plus the feature schema it was trained against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub schema_version: u32,
    pub target: PodTarget,
    pub feature_names: Vec<String>,
    pub model: RegressionModel,
}

impl ModelArtifact {
    /// Wrap a model with the current feature schema.
    pub fn new(target: PodTarget, model: RegressionModel) -> Self {
        Self {
            schema_version: FEATURE_SCHEMA_VERSION,
            target,
            feature_names: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
            model,
        }
    }

    /// Fail fast when the artifact disagrees with this build's feature schema.
    pub fn check_schema(&self) -> Result<(), AppError> {
        if self.schema_version != FEATURE_SCHEMA_VERSION {
            return Err(AppError::new(
                EXIT_MODEL,
                format!(
                    "Model for `{}` uses feature schema v{}, this build expects v{FEATURE_SCHEMA_VERSION}.",
                    self.target.column(),
                    self.schema_version
                ),
            ));
        }
        let matches = self.feature_names.len() == FEATURE_COUNT
            && self.feature_names.iter().zip(FEATURE_COLUMNS).all(|(a, b)| a == b);
        if !matches {
            return Err(AppError::new(
                EXIT_MODEL,
                format!(
                    "Model for `{}` was trained on columns [{}], expected [{}].",
                    self.target.column(),
                    self.feature_names.join(", "),
                    FEATURE_COLUMNS.join(", ")
                ),
            ));
        }
        self.model.validate().map_err(|e| {
            AppError::new(
                EXIT_MODEL,
                format!("Invalid model for `{}`: {e}", self.target.column()),
            )
        })
    }
}

impl PodModel for ModelArtifact {
    fn predict(&self, features: &[FeatureVector]) -> Result<Vec<f64>, AppError> {
        Ok(self.model.predict_rows(features))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(users: f64) -> FeatureVector {
        FeatureVector {
            gmv: 0.0,
            users,
            marketing_cost: 0.0,
            day_of_week: 0,
            day_of_month: 1,
            is_weekend: false,
            month: 7,
            gmv_7d_avg: 0.0,
            users_7d_avg: users,
            marketing_7d_avg: 0.0,
        }
    }

    fn stump(threshold: f64, low: f64, high: f64) -> Tree {
        Tree {
            nodes: vec![
                TreeNode::Split {
                    feature: 1,
                    threshold,
                    left: 1,
                    right: 2,
                },
                TreeNode::Leaf { value: low },
                TreeNode::Leaf { value: high },
            ],
        }
    }

    #[test]
    fn forest_averages_tree_outputs() {
        let model = RegressionModel::Forest(Forest {
            trees: vec![stump(100.0, 1.0, 3.0), stump(200.0, 2.0, 6.0)],
        });
        let out = model.predict_rows(&[features(50.0), features(150.0), features(250.0)]);
        assert_eq!(out, vec![1.5, 2.5, 4.5]);
    }

    #[test]
    fn split_goes_left_on_equal() {
        let model = RegressionModel::Forest(Forest {
            trees: vec![stump(100.0, 1.0, 3.0)],
        });
        assert_eq!(model.predict_rows(&[features(100.0)]), vec![1.0]);
    }

    #[test]
    fn linear_is_dot_product_plus_intercept() {
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[1] = 0.5;
        coefficients[6] = 1.0;
        let model = RegressionModel::Linear(LinearModel {
            intercept: 2.0,
            coefficients,
        });
        assert_eq!(model.predict_rows(&[features(10.0)]), vec![2.0 + 5.0 + 7.0]);
    }

    #[test]
    fn backward_child_reference_is_rejected() {
        let tree = Tree {
            nodes: vec![
                TreeNode::Leaf { value: 1.0 },
                TreeNode::Split {
                    feature: 0,
                    threshold: 0.0,
                    left: 0,
                    right: 0,
                },
            ],
        };
        let model = RegressionModel::Forest(Forest { trees: vec![tree] });
        assert!(model.validate().is_err());
    }

    #[test]
    fn artifact_json_shape() {
        let artifact = ModelArtifact::new(
            PodTarget::Backend,
            RegressionModel::Forest(Forest {
                trees: vec![stump(1.0, 1.0, 2.0)],
            }),
        );
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["target"], "be_pods");
        assert_eq!(json["model"]["kind"], "forest");
        assert_eq!(json["model"]["trees"][0]["nodes"][1]["value"], 1.0);

        let back: ModelArtifact = serde_json::from_value(json).unwrap();
        assert_eq!(back, artifact);
        back.check_schema().unwrap();
    }

    #[test]
    fn schema_mismatch_fails_fast() {
        let mut artifact = ModelArtifact::new(
            PodTarget::Frontend,
            RegressionModel::Forest(Forest {
                trees: vec![stump(1.0, 1.0, 2.0)],
            }),
        );
        artifact.feature_names.swap(0, 1);
        assert_eq!(artifact.check_schema().unwrap_err().exit_code(), EXIT_MODEL);

        artifact.feature_names = FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect();
        artifact.schema_version = FEATURE_SCHEMA_VERSION + 1;
        assert!(artifact.check_schema().is_err());
    }
}
