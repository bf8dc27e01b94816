//! Artifact loading - scaler, classifier, attribution background
//!
//! Runs once at startup. Every file is fingerprinted so the running model
//! can be traced back to its training export.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::inference::Classifier;
use super::scaler::{MinMaxScaler, NormalizedVector, Preprocessor, ScalerArtifact, ScalerError};
use super::trees::{GradientBoostedTrees, TreeModelError};
use crate::logic::features::{FeatureRecord, FEATURE_COUNT};

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid scaler {path}: {source}")]
    Scaler {
        path: PathBuf,
        #[source]
        source: ScalerError,
    },
    #[error("invalid model {path}: {source}")]
    Model {
        path: PathBuf,
        #[source]
        source: TreeModelError,
    },
    #[error("model {path} expects {actual} features, schema has {expected}")]
    FeatureCount { path: PathBuf, expected: usize, actual: usize },
    #[error("background {path}: row {row} has {actual} values, expected {expected}")]
    BackgroundRow { path: PathBuf, row: usize, expected: usize, actual: usize },
    #[error("ONNX model {path} requires the 'onnx' feature")]
    OnnxDisabled { path: PathBuf },
    #[cfg(feature = "onnx")]
    #[error("invalid ONNX model {path}: {source}")]
    Onnx {
        path: PathBuf,
        #[source]
        source: super::inference::InferenceError,
    },
}

/// Fingerprint of a loaded file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactInfo {
    pub kind: String,
    pub path: String,
    pub sha256: String,
}

/// Raw background records in canonical order, scaled at load
#[derive(Debug, Deserialize)]
struct BackgroundArtifact {
    rows: Vec<Vec<f64>>,
}

fn read(path: &Path, kind: &str) -> Result<(Vec<u8>, ArtifactInfo), ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let info = ArtifactInfo {
        kind: kind.to_string(),
        path: path.display().to_string(),
        sha256: hex::encode(Sha256::digest(&bytes)),
    };
    tracing::info!(kind, path = %info.path, sha256 = %info.sha256, bytes = bytes.len(), "Artifact loaded");

    Ok((bytes, info))
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path, bytes: &[u8]) -> Result<T, ArtifactError> {
    serde_json::from_slice(bytes).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn load_preprocessor(path: &Path) -> Result<(Preprocessor, ArtifactInfo), ArtifactError> {
    let (bytes, info) = read(path, "scaler")?;
    let artifact: ScalerArtifact = parse_json(path, &bytes)?;
    let scaler = MinMaxScaler::from_artifact(artifact).map_err(|source| ArtifactError::Scaler {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((Preprocessor::new(scaler), info))
}

/// `.onnx` goes to ONNX Runtime, anything else is read as XGBoost JSON
pub fn load_classifier(path: &Path) -> Result<(Arc<dyn Classifier>, ArtifactInfo), ArtifactError> {
    let is_onnx = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
    let (bytes, info) = read(path, "classifier")?;

    let classifier: Arc<dyn Classifier> = if is_onnx {
        load_onnx(path)?
    } else {
        let json = String::from_utf8_lossy(&bytes);
        let model = GradientBoostedTrees::from_json_str(&json).map_err(|source| ArtifactError::Model {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!(trees = model.tree_count(), "Tree ensemble ready");
        Arc::new(model)
    };

    if classifier.num_features() != FEATURE_COUNT {
        return Err(ArtifactError::FeatureCount {
            path: path.to_path_buf(),
            expected: FEATURE_COUNT,
            actual: classifier.num_features(),
        });
    }

    Ok((classifier, info))
}

#[cfg(feature = "onnx")]
fn load_onnx(path: &Path) -> Result<Arc<dyn Classifier>, ArtifactError> {
    let model = super::onnx::OnnxClassifier::load(&path.to_string_lossy()).map_err(|source| ArtifactError::Onnx {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "onnx"))]
fn load_onnx(path: &Path) -> Result<Arc<dyn Classifier>, ArtifactError> {
    Err(ArtifactError::OnnxDisabled { path: path.to_path_buf() })
}

/// Background rows for attribution, already normalized
pub fn load_background(
    path: &Path,
    preprocessor: &Preprocessor,
) -> Result<(Vec<NormalizedVector>, ArtifactInfo), ArtifactError> {
    let (bytes, info) = read(path, "background")?;
    let artifact: BackgroundArtifact = parse_json(path, &bytes)?;

    let rows = artifact
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let values: [f64; FEATURE_COUNT] = row.as_slice().try_into().map_err(|_| ArtifactError::BackgroundRow {
                path: path.to_path_buf(),
                row: i,
                expected: FEATURE_COUNT,
                actual: row.len(),
            })?;
            Ok(preprocessor.transform(&FeatureRecord::from_values(values)))
        })
        .collect::<Result<Vec<_>, ArtifactError>>()?;

    Ok((rows, info))
}
