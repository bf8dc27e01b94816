//! Gradient-boosted tree ensemble in XGBoost's JSON model format
//!
//! Only what inference needs is read: booster type, objective, base score
//! and the per-tree node arrays. Structure is validated at load so that
//! scoring never indexes out of bounds.

use ndarray::ArrayView2;
use serde::{Deserialize, Deserializer};

use super::inference::{check_shape, sigmoid, Classifier, InferenceError};

#[derive(Debug, thiserror::Error)]
pub enum TreeModelError {
    #[error("invalid model JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported booster '{0}', expected 'gbtree'")]
    Booster(String),
    #[error("unsupported objective '{0}', expected 'binary:logistic'")]
    Objective(String),
    #[error("invalid {field} '{value}'")]
    Param { field: &'static str, value: String },
    #[error("tree {tree}: {reason}")]
    Tree { tree: usize, reason: String },
    #[error("model has no trees")]
    Empty,
}

// ============================================================================
// JSON LAYOUT
// ============================================================================

#[derive(Debug, Deserialize)]
struct ModelFile {
    learner: Learner,
}

#[derive(Debug, Deserialize)]
struct Learner {
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Debug, Deserialize)]
struct GradientBooster {
    name: String,
    #[serde(default)]
    model: Option<BoosterModel>,
}

#[derive(Debug, Deserialize)]
struct BoosterModel {
    trees: Vec<TreeJson>,
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct Objective {
    name: String,
}

#[derive(Debug, Deserialize)]
struct TreeJson {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<u32>,
    split_conditions: Vec<f32>,
    #[serde(deserialize_with = "flags")]
    default_left: Vec<bool>,
}

/// `default_left` is written as 0/1 integers by most versions, booleans by some
fn flags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<bool>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        Int(u8),
    }

    let raw = Vec::<Flag>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|f| match f {
            Flag::Bool(b) => b,
            Flag::Int(i) => i != 0,
        })
        .collect())
}

// ============================================================================
// MODEL
// ============================================================================

/// Flattened node. Leaves have `left == LEAF`.
#[derive(Debug, Clone, Copy)]
struct Node {
    left: u32,
    right: u32,
    feature: u32,
    /// Split threshold for inner nodes, leaf value for leaves
    value: f32,
    default_left: bool,
}

const LEAF: u32 = u32::MAX;

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn from_json(index: usize, json: TreeJson, num_features: usize) -> Result<Self, TreeModelError> {
        let n = json.left_children.len();
        let fail = |reason: String| TreeModelError::Tree { tree: index, reason };

        if n == 0 {
            return Err(fail("no nodes".into()));
        }
        if [json.right_children.len(), json.split_indices.len(), json.split_conditions.len(), json.default_left.len()]
            .iter()
            .any(|len| *len != n)
        {
            return Err(fail("node arrays have different lengths".into()));
        }

        let mut nodes = Vec::with_capacity(n);
        for i in 0..n {
            let (l, r) = (json.left_children[i], json.right_children[i]);
            let node = if l == -1 {
                Node {
                    left: LEAF,
                    right: LEAF,
                    feature: 0,
                    value: json.split_conditions[i],
                    default_left: false,
                }
            } else {
                // Children always come after their parent, which also rules out cycles
                let in_range = |c: i32| c > i as i32 && (c as usize) < n;
                if !in_range(l) || !in_range(r) {
                    return Err(fail(format!("node {} has invalid children ({}, {})", i, l, r)));
                }
                let feature = json.split_indices[i];
                if feature as usize >= num_features {
                    return Err(fail(format!("node {} splits on feature {}", i, feature)));
                }
                Node {
                    left: l as u32,
                    right: r as u32,
                    feature,
                    value: json.split_conditions[i],
                    default_left: json.default_left[i],
                }
            };
            nodes.push(node);
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.left == LEAF {
                return node.value;
            }
            let x = row[node.feature as usize];
            let go_left = if x.is_nan() { node.default_left } else { x < node.value };
            let next = if go_left { node.left } else { node.right };
            idx = next as usize;
        }
    }
}

/// Binary logistic gradient-boosted trees
#[derive(Debug, Clone)]
pub struct GradientBoostedTrees {
    trees: Vec<Tree>,
    base_margin: f64,
    num_features: usize,
}

impl GradientBoostedTrees {
    pub fn from_json_str(json: &str) -> Result<Self, TreeModelError> {
        let file: ModelFile = serde_json::from_str(json)?;
        let learner = file.learner;

        if learner.gradient_booster.name != "gbtree" {
            return Err(TreeModelError::Booster(learner.gradient_booster.name));
        }
        if learner.objective.name != "binary:logistic" {
            return Err(TreeModelError::Objective(learner.objective.name));
        }

        let base_score = parse_param("base_score", &learner.learner_model_param.base_score)?;
        if !(base_score > 0.0 && base_score < 1.0) {
            return Err(TreeModelError::Param {
                field: "base_score",
                value: learner.learner_model_param.base_score,
            });
        }
        let num_features = parse_param("num_feature", &learner.learner_model_param.num_feature)? as usize;

        let trees = learner
            .gradient_booster
            .model
            .map(|m| m.trees)
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, t)| Tree::from_json(i, t, num_features))
            .collect::<Result<Vec<_>, _>>()?;

        if trees.is_empty() {
            return Err(TreeModelError::Empty);
        }

        Ok(Self {
            trees,
            base_margin: super::inference::logit(base_score),
            num_features,
        })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Raw log-odds for one row
    pub fn margin(&self, row: &[f32]) -> f64 {
        self.base_margin + self.trees.iter().map(|t| t.leaf_value(row) as f64).sum::<f64>()
    }
}

/// Scalar params are strings; newer versions wrap them in brackets (`"[5E-1]"`)
fn parse_param(field: &'static str, raw: &str) -> Result<f64, TreeModelError> {
    raw.trim()
        .trim_start_matches('[')
        .trim_end_matches(']')
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| TreeModelError::Param { field, value: raw.to_string() })
}

impl Classifier for GradientBoostedTrees {
    fn name(&self) -> &str {
        "xgboost-json"
    }

    fn num_features(&self) -> usize {
        self.num_features
    }

    fn predict_positive(&self, batch: ArrayView2<'_, f32>) -> Result<Vec<f64>, InferenceError> {
        check_shape(&batch, self.num_features)?;

        let mut out = Vec::with_capacity(batch.nrows());
        let mut row_buf = vec![0.0f32; self.num_features];
        for row in batch.rows() {
            // Rows of a transposed or sliced view may not be contiguous
            let values = match row.as_slice() {
                Some(slice) => slice,
                None => {
                    for (dst, src) in row_buf.iter_mut().zip(row.iter()) {
                        *dst = *src;
                    }
                    &row_buf[..]
                }
            };
            out.push(sigmoid(self.margin(values)));
        }
        Ok(out)
    }
}
