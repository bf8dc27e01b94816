//! Logic Module - prediction pipeline
//!
//! - `features/` - canonical schema and validated records
//! - `model/` - scaler, classifier backends, artifact loading
//! - `explain/` - attribution, narrative, mock fallback
//! - `context` - artifacts loaded once at startup
//! - `service` - one request through the whole pipeline

pub mod features;
pub mod model;
pub mod explain;
pub mod context;
pub mod service;

#[cfg(test)]
pub(crate) mod fixtures;

pub use context::{ModelContext, ModelInfo};
pub use service::{PredictionResult, PredictionService, ServiceError};
