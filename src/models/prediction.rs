//! Prediction payloads

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::logic::features::RawRecord;
use crate::logic::PredictionResult;

pub const MAX_BATCH_RECORDS: usize = 256;

/// Results in input order; a single-record request yields one entry
#[derive(Debug, Serialize)]
pub struct PredictionResponse {
    pub results: Vec<PredictionResult>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct BatchPredictRequest {
    #[validate(length(min = 1, max = 256))]
    pub records: Vec<RawRecord>,
}
