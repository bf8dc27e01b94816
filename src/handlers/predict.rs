//! Prediction handlers

use axum::{extract::{rejection::JsonRejection, State}, Json};
use validator::Validate;

use crate::logic::features::RawRecord;
use crate::models::{BatchPredictRequest, PredictionResponse};
use crate::{AppResult, AppState};

/// Score one record
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<RawRecord>, JsonRejection>,
) -> AppResult<Json<PredictionResponse>> {
    let Json(record) = payload?;
    let result = state.service.run(&record).await?;

    Ok(Json(PredictionResponse { results: vec![result] }))
}

/// Score up to 256 records; one bad record rejects the batch
pub async fn predict_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchPredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictionResponse>> {
    let Json(req) = payload?;
    req.validate()?;

    let results = state.service.run_batch(&req.records).await?;
    tracing::info!(records = results.len(), "Batch scored");

    Ok(Json(PredictionResponse { results }))
}
