//! ONNX Runtime backend
//!
//! For classifiers exported with onnxmltools/skl2onnx. Reads the
//! `probabilities` output (N x 2), falling back to the last declared output.

use ndarray::{ArrayView2, Array2};
use ort::session::{Session, builder::GraphOptimizationLevel};
use ort::value::Value;
use parking_lot::Mutex;

use super::inference::{check_shape, Classifier, InferenceError};
use crate::logic::features::FEATURE_COUNT;

const PROBABILITIES_OUTPUT: &str = "probabilities";

pub struct OnnxClassifier {
    // Session::run needs exclusive access
    session: Mutex<Session>,
    output_name: String,
}

impl OnnxClassifier {
    pub fn load(model_path: &str) -> Result<Self, InferenceError> {
        tracing::info!("Loading ONNX model from: {}", model_path);

        let session = Session::builder()
            .map_err(|e| InferenceError::Backend(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| InferenceError::Backend(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(model_path)
            .map_err(|e| InferenceError::Backend(format!("Failed to load model: {}", e)))?;

        let output_name = session.outputs.iter()
            .find(|o| o.name == PROBABILITIES_OUTPUT)
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .ok_or_else(|| InferenceError::Backend("No output defined".to_string()))?;

        tracing::info!(output = %output_name, "ONNX model loaded successfully");

        Ok(Self {
            session: Mutex::new(session),
            output_name,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn name(&self) -> &str {
        "onnx"
    }

    fn num_features(&self) -> usize {
        FEATURE_COUNT
    }

    fn predict_positive(&self, batch: ArrayView2<'_, f32>) -> Result<Vec<f64>, InferenceError> {
        check_shape(&batch, FEATURE_COUNT)?;
        let rows = batch.nrows();

        let input: Array2<f32> = batch.to_owned();
        let input_tensor = Value::from_array(input)
            .map_err(|e| InferenceError::Backend(format!("Tensor error: {}", e)))?;

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| InferenceError::Backend(format!("Inference failed: {}", e)))?;

        let output = outputs.get(&self.output_name)
            .ok_or_else(|| InferenceError::Backend("No output".to_string()))?;

        let (_, data) = output.try_extract_tensor::<f32>()
            .map_err(|e| InferenceError::Backend(format!("Extract error: {}", e)))?;

        if data.len() != rows * 2 {
            return Err(InferenceError::OutputLength { expected: rows, actual: data.len() / 2 });
        }

        Ok(data.chunks_exact(2).map(|pair| pair[1] as f64).collect())
    }
}
