//! Inference Engine - classifier abstraction and batch prediction
//!
//! The classifier backend (native tree ensemble, ONNX Runtime) is swappable
//! behind [`Classifier`]; [`Predictor`] turns its probabilities into
//! [`PredictionOutcome`]s.

use std::sync::Arc;
use std::time::Instant;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::scaler::NormalizedVector;
use crate::logic::features::FEATURE_COUNT;

// ============================================================================
// ERROR HANDLING
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("empty batch")]
    EmptyBatch,
    #[error("input shape ({rows}, {cols}) rejected, model expects {expected} features")]
    Shape { rows: usize, cols: usize, expected: usize },
    #[error("model returned {actual} rows for a batch of {expected}")]
    OutputLength { expected: usize, actual: usize },
    #[error("model returned an invalid probability: {0}")]
    InvalidProbability(f64),
    #[error("backend failure: {0}")]
    Backend(String),
}

// ============================================================================
// CLASSIFIER TRAIT
// ============================================================================

/// Fitted binary classifier shared read-only across requests
pub trait Classifier: Send + Sync {
    /// Short backend description for status output
    fn name(&self) -> &str;

    /// Number of input columns the model was fitted on
    fn num_features(&self) -> usize;

    /// P(label 1) for each row of `batch` (rows x features)
    fn predict_positive(&self, batch: ArrayView2<'_, f32>) -> Result<Vec<f64>, InferenceError>;
}

/// Reject batches the model cannot score
pub fn check_shape(batch: &ArrayView2<'_, f32>, expected: usize) -> Result<(), InferenceError> {
    let (rows, cols) = batch.dim();
    if rows == 0 {
        return Err(InferenceError::EmptyBatch);
    }
    if cols != expected {
        return Err(InferenceError::Shape { rows, cols, expected });
    }
    Ok(())
}

/// Stack normalized vectors into a (rows x features) matrix
pub fn to_batch(vectors: &[NormalizedVector]) -> Array2<f32> {
    let mut batch = Array2::<f32>::zeros((vectors.len(), FEATURE_COUNT));
    for (mut row, vector) in batch.rows_mut().into_iter().zip(vectors) {
        for (cell, value) in row.iter_mut().zip(vector.values.iter()) {
            *cell = *value;
        }
    }
    batch
}

/// Log-odds with clamping so certain predictions stay finite
pub fn logit(p: f64) -> f64 {
    let p = p.clamp(1e-12, 1.0 - 1e-12);
    (p / (1.0 - p)).ln()
}

pub fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

// ============================================================================
// PREDICTION
// ============================================================================

/// Prediction output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionOutcome {
    /// 0 = healthy, 1 = Parkinson's
    #[serde(rename = "prediction")]
    pub label: u8,
    pub probability_healthy: f64,
    pub probability_parkinsons: f64,
}

impl PredictionOutcome {
    /// Build from P(label 1). Ties resolve to label 0.
    pub fn from_positive(p1: f64) -> Result<Self, InferenceError> {
        if !(0.0..=1.0).contains(&p1) {
            return Err(InferenceError::InvalidProbability(p1));
        }
        let p0 = 1.0 - p1;
        Ok(Self {
            label: if p1 > p0 { 1 } else { 0 },
            probability_healthy: p0,
            probability_parkinsons: p1,
        })
    }

    pub fn is_parkinsons(&self) -> bool {
        self.label == 1
    }
}

/// Wraps the fitted classifier
#[derive(Clone)]
pub struct Predictor {
    classifier: Arc<dyn Classifier>,
}

impl Predictor {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Arc<dyn Classifier> {
        &self.classifier
    }

    /// One outcome per vector, in input order
    pub fn predict(&self, vectors: &[NormalizedVector]) -> Result<Vec<PredictionOutcome>, InferenceError> {
        let start_time = Instant::now();

        let batch = to_batch(vectors);
        let view = batch.view();
        check_shape(&view, self.classifier.num_features())?;

        let positives = self.classifier.predict_positive(view)?;
        if positives.len() != vectors.len() {
            return Err(InferenceError::OutputLength {
                expected: vectors.len(),
                actual: positives.len(),
            });
        }

        let outcomes = positives
            .into_iter()
            .map(PredictionOutcome::from_positive)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            backend = self.classifier.name(),
            rows = vectors.len(),
            elapsed_us = start_time.elapsed().as_micros() as u64,
            "Inference complete"
        );

        Ok(outcomes)
    }
}
