//! Prediction Service - validate, predict, explain
//!
//! Validation and inference errors fail the request. Explanation problems
//! never do: the assembler always returns something of the same shape.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use crate::logic::context::ModelContext;
use crate::logic::explain::{mock_explanation, Explanation, ExplanationAssembler, NarrativeGenerator};
use crate::logic::features::{FeatureRecord, RawRecord, SchemaError};
use crate::logic::model::{InferenceError, NormalizedVector, PredictionOutcome, Predictor, Preprocessor};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] SchemaError),
    #[error("record {index}: {source}")]
    InvalidRecord {
        index: usize,
        #[source]
        source: SchemaError,
    },
    #[error("model inference failed: {0}")]
    Inference(#[from] InferenceError),
}

/// One complete answer per input record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    #[serde(flatten)]
    pub outcome: PredictionOutcome,
    #[serde(rename = "original_data")]
    pub original_record: FeatureRecord,
    pub explanation: Explanation,
}

/// Explanations assembled at once per batch
pub const BATCH_CONCURRENCY: usize = 16;

pub struct PredictionService {
    preprocessor: Preprocessor,
    predictor: Predictor,
    assembler: ExplanationAssembler,
}

impl PredictionService {
    pub fn new(context: ModelContext, narrator: NarrativeGenerator) -> Self {
        Self {
            preprocessor: context.preprocessor,
            predictor: context.predictor,
            assembler: ExplanationAssembler::new(context.attributor, narrator),
        }
    }

    pub fn explainer_available(&self) -> bool {
        self.assembler.attribution_available()
    }

    pub async fn run(&self, raw: &RawRecord) -> Result<PredictionResult, ServiceError> {
        let request_id = Uuid::new_v4();
        async move {
            let (record, vector) = self.preprocessor.prepare(raw)?;
            let outcome = self.predict_one(&vector)?;
            Ok(explain(&self.assembler, outcome, record, vector).await)
        }
        .instrument(tracing::info_span!("prediction", %request_id))
        .await
    }

    /// All records are validated before anything is scored. Explanations are
    /// assembled concurrently, at most [`BATCH_CONCURRENCY`] at a time, and
    /// returned in input order.
    pub async fn run_batch(&self, raws: &[RawRecord]) -> Result<Vec<PredictionResult>, ServiceError> {
        let request_id = Uuid::new_v4();
        async move {
            let mut prepared = Vec::with_capacity(raws.len());
            for (index, raw) in raws.iter().enumerate() {
                let pair = self
                    .preprocessor
                    .prepare(raw)
                    .map_err(|source| ServiceError::InvalidRecord { index, source })?;
                prepared.push(pair);
            }

            let vectors: Vec<NormalizedVector> = prepared.iter().map(|(_, v)| *v).collect();
            let outcomes = self.predictor.predict(&vectors)?;

            let limit = Arc::new(Semaphore::new(BATCH_CONCURRENCY));
            let mut tasks = JoinSet::new();
            let pending = prepared.iter().cloned().zip(outcomes.iter().copied());
            for (index, ((record, vector), outcome)) in pending.enumerate() {
                let assembler = self.assembler.clone();
                let limit = limit.clone();
                tasks.spawn(
                    async move {
                        let _permit = limit.acquire_owned().await.ok();
                        (index, explain(&assembler, outcome, record, vector).await)
                    }
                    .in_current_span(),
                );
            }

            let mut slots: Vec<Option<PredictionResult>> = (0..prepared.len()).map(|_| None).collect();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok((index, result)) => slots[index] = Some(result),
                    Err(e) => tracing::error!(error = %e, "Explanation task aborted"),
                }
            }

            // An aborted task still yields a complete result
            let results = slots
                .into_iter()
                .zip(prepared.into_iter().zip(outcomes))
                .map(|(slot, ((record, _), outcome))| {
                    slot.unwrap_or_else(|| PredictionResult {
                        outcome,
                        original_record: record,
                        explanation: mock_explanation(&outcome),
                    })
                })
                .collect();
            Ok(results)
        }
        .instrument(tracing::info_span!("batch_prediction", %request_id, records = raws.len()))
        .await
    }

    fn predict_one(&self, vector: &NormalizedVector) -> Result<PredictionOutcome, InferenceError> {
        self.predictor
            .predict(std::slice::from_ref(vector))?
            .into_iter()
            .next()
            .ok_or(InferenceError::OutputLength { expected: 1, actual: 0 })
    }
}

async fn explain(
    assembler: &ExplanationAssembler,
    outcome: PredictionOutcome,
    record: FeatureRecord,
    vector: NormalizedVector,
) -> PredictionResult {
    tracing::info!(
        prediction = outcome.label,
        probability_parkinsons = outcome.probability_parkinsons,
        "Prediction made"
    );
    let explanation = assembler.assemble(&outcome, &record, &vector).await;
    PredictionResult {
        outcome,
        original_record: record,
        explanation,
    }
}
