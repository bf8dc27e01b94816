//! Explanation Assembler
//!
//! Real path: attribution on the blocking pool, then narrative. Any
//! attribution problem (engine absent, error, panic) switches to
//! [`mock_explanation`]. The response shape is the same either way.

use std::sync::Arc;

use super::attribution::Attributor;
use super::fallback::mock_explanation;
use super::narrative::NarrativeGenerator;
use super::types::{Explanation, ExplanationPath};
use crate::logic::features::FeatureRecord;
use crate::logic::model::{NormalizedVector, PredictionOutcome};

#[derive(Clone)]
pub struct ExplanationAssembler {
    attributor: Option<Arc<dyn Attributor>>,
    narrator: NarrativeGenerator,
}

impl ExplanationAssembler {
    pub fn new(attributor: Option<Arc<dyn Attributor>>, narrator: NarrativeGenerator) -> Self {
        Self { attributor, narrator }
    }

    pub fn attribution_available(&self) -> bool {
        self.attributor.is_some()
    }

    pub async fn assemble(
        &self,
        outcome: &PredictionOutcome,
        record: &FeatureRecord,
        vector: &NormalizedVector,
    ) -> Explanation {
        self.assemble_traced(outcome, record, vector).await.0
    }

    /// Same as [`assemble`](Self::assemble), also reporting the path taken
    pub async fn assemble_traced(
        &self,
        outcome: &PredictionOutcome,
        record: &FeatureRecord,
        vector: &NormalizedVector,
    ) -> (Explanation, ExplanationPath) {
        let Some(attributor) = self.attributor.clone() else {
            return fallback(outcome, "attribution engine unavailable");
        };

        let instance = *vector;
        let scores = match tokio::task::spawn_blocking(move || attributor.attribute(&instance)).await {
            Ok(Ok(scores)) => scores,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Attribution failed");
                return fallback(outcome, "attribution failed");
            }
            Err(e) => {
                tracing::error!(error = %e, "Attribution task aborted");
                return fallback(outcome, "attribution task aborted");
            }
        };

        let narrative = self.narrator.narrate(record, &scores).await;

        let path = ExplanationPath::Model;
        tracing::info!(path = path.as_str(), scores = scores.len(), "Explanation assembled");

        (Explanation { shap_values: scores, narrative }, path)
    }
}

fn fallback(outcome: &PredictionOutcome, reason: &'static str) -> (Explanation, ExplanationPath) {
    let path = ExplanationPath::Fallback;
    tracing::info!(path = path.as_str(), reason, "Explanation assembled");
    (mock_explanation(outcome), path)
}
