//! Preprocessor - fitted min-max normalization
//!
//! Parameters come from the training-time scaler and are fixed for the
//! lifetime of the process.

use serde::{Deserialize, Serialize};

use crate::logic::features::{
    validate_layout, FeatureRecord, LayoutMismatchError, RawRecord, SchemaError, FEATURE_COUNT,
};

/// Model-ready vector in canonical feature order
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedVector {
    pub values: [f32; FEATURE_COUNT],
}

impl NormalizedVector {
    pub fn from_values(values: [f32; FEATURE_COUNT]) -> Self {
        Self { values }
    }

    /// Midpoint of the fitted range (all zeros for a (-1, 1) scaler)
    pub fn zeros() -> Self {
        Self { values: [0.0; FEATURE_COUNT] }
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }
}

/// Scaler artifact as written by the export step.
///
/// Either the fitted `scale`/`min` attributes, or the observed data ranges
/// plus the target range.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalerArtifact {
    Fitted {
        feature_names: Vec<String>,
        scale: Vec<f64>,
        min: Vec<f64>,
    },
    Ranges {
        feature_names: Vec<String>,
        data_min: Vec<f64>,
        data_max: Vec<f64>,
        #[serde(default = "default_feature_range")]
        feature_range: (f64, f64),
    },
}

fn default_feature_range() -> (f64, f64) {
    (-1.0, 1.0)
}

#[derive(Debug, thiserror::Error)]
pub enum ScalerError {
    #[error(transparent)]
    Layout(#[from] LayoutMismatchError),
    #[error("{field} has {actual} entries, expected {expected}")]
    Length { field: &'static str, expected: usize, actual: usize },
    #[error("{field}[{index}] is not a finite number")]
    NonFinite { field: &'static str, index: usize },
    #[error("data_max[{index}] is below data_min[{index}]")]
    InvertedRange { index: usize },
    #[error("feature_range ({0}, {1}) is empty or inverted")]
    InvalidTarget(f64, f64),
}

/// Affine per-feature transform `x' = x * scale + min`
#[derive(Debug, Clone, PartialEq)]
pub struct MinMaxScaler {
    scale: [f64; FEATURE_COUNT],
    min: [f64; FEATURE_COUNT],
}

impl MinMaxScaler {
    pub fn from_artifact(artifact: ScalerArtifact) -> Result<Self, ScalerError> {
        match artifact {
            ScalerArtifact::Fitted { feature_names, scale, min } => {
                validate_layout(&feature_names)?;
                Ok(Self {
                    scale: to_array("scale", &scale)?,
                    min: to_array("min", &min)?,
                })
            }
            ScalerArtifact::Ranges { feature_names, data_min, data_max, feature_range } => {
                validate_layout(&feature_names)?;
                let data_min = to_array("data_min", &data_min)?;
                let data_max = to_array("data_max", &data_max)?;
                Self::from_ranges(&data_min, &data_max, feature_range)
            }
        }
    }

    /// Fit from observed ranges. A constant feature gets unit range.
    pub fn from_ranges(
        data_min: &[f64; FEATURE_COUNT],
        data_max: &[f64; FEATURE_COUNT],
        (lo, hi): (f64, f64),
    ) -> Result<Self, ScalerError> {
        if !(lo.is_finite() && hi.is_finite() && lo < hi) {
            return Err(ScalerError::InvalidTarget(lo, hi));
        }

        let mut scale = [0.0; FEATURE_COUNT];
        let mut min = [0.0; FEATURE_COUNT];

        for i in 0..FEATURE_COUNT {
            let range = data_max[i] - data_min[i];
            if range < 0.0 {
                return Err(ScalerError::InvertedRange { index: i });
            }
            let range = if range == 0.0 { 1.0 } else { range };
            scale[i] = (hi - lo) / range;
            min[i] = lo - data_min[i] * scale[i];
        }

        Ok(Self { scale, min })
    }

    pub fn transform(&self, values: &[f64; FEATURE_COUNT]) -> NormalizedVector {
        let mut normalized = [0.0f32; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            normalized[i] = (values[i] * self.scale[i] + self.min[i]) as f32;
        }
        NormalizedVector { values: normalized }
    }
}

fn to_array(field: &'static str, values: &[f64]) -> Result<[f64; FEATURE_COUNT], ScalerError> {
    let array: [f64; FEATURE_COUNT] = values
        .try_into()
        .map_err(|_| ScalerError::Length { field, expected: FEATURE_COUNT, actual: values.len() })?;

    if let Some(index) = array.iter().position(|v| !v.is_finite()) {
        return Err(ScalerError::NonFinite { field, index });
    }
    Ok(array)
}

/// Validates raw input and maps it onto the model's normalized space
#[derive(Debug, Clone)]
pub struct Preprocessor {
    scaler: MinMaxScaler,
}

impl Preprocessor {
    pub fn new(scaler: MinMaxScaler) -> Self {
        Self { scaler }
    }

    pub fn validate(&self, raw: &RawRecord) -> Result<FeatureRecord, SchemaError> {
        FeatureRecord::from_raw(raw)
    }

    pub fn transform(&self, record: &FeatureRecord) -> NormalizedVector {
        self.scaler.transform(record.values())
    }

    /// Validate then transform
    pub fn prepare(&self, raw: &RawRecord) -> Result<(FeatureRecord, NormalizedVector), SchemaError> {
        let record = self.validate(raw)?;
        let vector = self.transform(&record);
        Ok((record, vector))
    }
}
