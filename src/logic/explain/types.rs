use serde::{Deserialize, Serialize};

use crate::logic::features::Feature;

/// Signed contribution of one feature to one prediction.
/// Positive pushes towards Parkinson's (label 1), negative towards healthy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AttributionScore {
    pub feature: Feature,
    #[serde(rename = "value")]
    pub contribution: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub shap_values: Vec<AttributionScore>,
    pub narrative: String,
}

/// Which generator produced an explanation. Logged, never serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplanationPath {
    Model,
    Fallback,
}

impl ExplanationPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExplanationPath::Model => "model",
            ExplanationPath::Fallback => "fallback",
        }
    }
}
