//! Model Module - preprocessing and inference
//!
//! Keeps the classifier backend swappable behind one trait.

pub mod scaler;
pub mod inference;
pub mod trees;
pub mod artifacts;
#[cfg(feature = "onnx")]
pub mod onnx;

// Re-export common types
pub use scaler::{MinMaxScaler, NormalizedVector, Preprocessor};
pub use inference::{Classifier, InferenceError, PredictionOutcome, Predictor};
pub use trees::GradientBoostedTrees;
pub use artifacts::{ArtifactError, ArtifactInfo};
