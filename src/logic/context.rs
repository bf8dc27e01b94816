//! Model Context - everything loaded once at startup
//!
//! Built before the server binds and shared read-only afterwards. Missing
//! scaler/classifier artifacts abort startup; a background file or engine
//! that can't be used only disables attribution.

use std::sync::Arc;

use serde::Serialize;

use crate::config::Config;
use crate::logic::explain::{Attributor, SamplingShapley, ShapleySettings};
use crate::logic::model::artifacts::{self, ArtifactError, ArtifactInfo};
use crate::logic::model::{Classifier, NormalizedVector, Preprocessor, Predictor};

pub struct ModelContext {
    pub preprocessor: Preprocessor,
    pub predictor: Predictor,
    /// `None` when the engine could not be built or was disabled
    pub attributor: Option<Arc<dyn Attributor>>,
    pub artifacts: Vec<ArtifactInfo>,
}

/// Model status for the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub classifier: String,
    pub explainer_available: bool,
    pub artifacts: Vec<ArtifactInfo>,
}

impl ModelContext {
    pub fn load(config: &Config) -> Result<Self, ArtifactError> {
        let (preprocessor, scaler_info) = artifacts::load_preprocessor(&config.scaler_path)?;
        let (classifier, model_info) = artifacts::load_classifier(&config.model_path)?;
        let mut infos = vec![scaler_info, model_info];

        let attributor = if config.attribution_enabled {
            let background = match &config.background_path {
                Some(path) => match artifacts::load_background(path, &preprocessor) {
                    Ok((rows, info)) => {
                        infos.push(info);
                        Some(rows)
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Background unusable, attribution disabled");
                        None
                    }
                },
                None => Some(vec![NormalizedVector::zeros()]),
            };

            background.and_then(|rows| build_attributor(classifier.clone(), rows, config.shapley_settings()))
        } else {
            tracing::info!("Attribution disabled by configuration");
            None
        };

        Ok(Self::new(preprocessor, classifier, attributor, infos))
    }

    pub fn new(
        preprocessor: Preprocessor,
        classifier: Arc<dyn Classifier>,
        attributor: Option<Arc<dyn Attributor>>,
        artifacts: Vec<ArtifactInfo>,
    ) -> Self {
        if attributor.is_none() {
            tracing::warn!("Explainer unavailable, serving mock explanations");
        }
        Self {
            preprocessor,
            predictor: Predictor::new(classifier),
            attributor,
            artifacts,
        }
    }

    pub fn info(&self) -> ModelInfo {
        ModelInfo {
            classifier: self.predictor.classifier().name().to_string(),
            explainer_available: self.attributor.is_some(),
            artifacts: self.artifacts.clone(),
        }
    }
}

/// Construction failure is recoverable: log and run without attribution
pub fn build_attributor(
    classifier: Arc<dyn Classifier>,
    background: Vec<NormalizedVector>,
    settings: ShapleySettings,
) -> Option<Arc<dyn Attributor>> {
    match SamplingShapley::new(classifier, background, settings) {
        Ok(engine) => Some(Arc::new(engine)),
        Err(e) => {
            tracing::warn!(error = %e, "Attribution engine failed to initialize");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::fixtures;

    #[test]
    fn test_load_with_default_background() {
        let (_dir, config) = fixtures::artifact_config();
        let context = ModelContext::load(&config).unwrap();

        let info = context.info();
        assert!(info.explainer_available);
        assert_eq!(info.classifier, "xgboost-json");
        assert_eq!(info.artifacts.len(), 2);
    }

    #[test]
    fn test_disabled_attribution() {
        let (_dir, mut config) = fixtures::artifact_config();
        config.attribution_enabled = false;

        let context = ModelContext::load(&config).unwrap();
        assert!(context.attributor.is_none());
    }

    #[test]
    fn test_bad_background_is_not_fatal() {
        let (dir, mut config) = fixtures::artifact_config();
        let path = dir.path().join("background.json");
        std::fs::write(&path, r#"{ "rows": [] }"#).unwrap();
        config.background_path = Some(path);

        // Empty background: engine construction fails, service still loads
        let context = ModelContext::load(&config).unwrap();
        assert!(context.attributor.is_none());

        config.background_path = Some(dir.path().join("missing.json"));
        let context = ModelContext::load(&config).unwrap();
        assert!(context.attributor.is_none());
    }

    #[test]
    fn test_zero_permutations_disables_attribution() {
        let (_dir, mut config) = fixtures::artifact_config();
        config.attribution_permutations = 0;
        let context = ModelContext::load(&config).unwrap();
        assert!(!context.info().explainer_available);
    }

    #[test]
    fn test_oversized_sampling_disables_attribution() {
        let (_dir, mut config) = fixtures::artifact_config();
        config.attribution_permutations = 1_000_000;
        let context = ModelContext::load(&config).unwrap();
        assert!(!context.info().explainer_available);
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let (dir, mut config) = fixtures::artifact_config();
        config.model_path = dir.path().join("absent.json");
        assert!(matches!(ModelContext::load(&config), Err(ArtifactError::Io { .. })));
    }
}
