//! Attribution Engine - sampled Shapley values over a background distribution
//!
//! The explained output is the classifier's log-odds for label 1. For every
//! background row and every sampled permutation, features are switched from
//! the background value to the instance value one at a time and each feature
//! is credited with the change it causes. Each walk ends at the instance
//! itself, so the credits of one walk sum to `f(x) - f(b)` and the averaged
//! scores sum to `f(x) - E[f(b)]`.

use std::sync::Arc;
use std::time::Instant;

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::types::AttributionScore;
use crate::logic::features::{Feature, FEATURE_COUNT};
use crate::logic::model::inference::{logit, to_batch, Classifier, InferenceError};
use crate::logic::model::NormalizedVector;

/// Absolute tolerance (log-odds) on `sum(scores) - (f(x) - E[f(b)])`
pub const ADDITIVITY_TOLERANCE: f64 = 1e-6;

/// Upper bound on rows scored per call (background x permutations x features)
pub const MAX_SCORED_ROWS: usize = 1 << 20;

#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    #[error("background set is empty")]
    EmptyBackground,
    #[error("permutation count must be at least 1")]
    NoPermutations,
    #[error("{background} background rows x {permutations} permutations exceeds {max} scored rows per call")]
    TooLarge { background: usize, permutations: usize, max: usize },
    #[error("classifier expects {actual} features, attribution needs {expected}")]
    FeatureCount { expected: usize, actual: usize },
    #[error("classifier failed: {0}")]
    Inference(#[from] InferenceError),
    #[error("non-finite model output")]
    NonFinite,
}

/// Per-instance attribution, shared read-only across requests
pub trait Attributor: Send + Sync {
    /// Mean model output over the baseline distribution
    fn expected_value(&self) -> f64;

    /// Model output being explained, for one instance
    fn output(&self, instance: &NormalizedVector) -> Result<f64, AttributionError>;

    /// One score per feature, canonical order
    fn attribute(&self, instance: &NormalizedVector) -> Result<Vec<AttributionScore>, AttributionError>;
}

#[derive(Debug, Clone, Copy)]
pub struct ShapleySettings {
    /// Sampled permutations per background row
    pub permutations: usize,
    pub seed: u64,
}

impl Default for ShapleySettings {
    fn default() -> Self {
        Self { permutations: 32, seed: 7 }
    }
}

pub struct SamplingShapley {
    classifier: Arc<dyn Classifier>,
    background: Vec<NormalizedVector>,
    background_outputs: Vec<f64>,
    expected_value: f64,
    settings: ShapleySettings,
}

impl SamplingShapley {
    /// Scores the background once; fails if the classifier cannot.
    pub fn new(
        classifier: Arc<dyn Classifier>,
        background: Vec<NormalizedVector>,
        settings: ShapleySettings,
    ) -> Result<Self, AttributionError> {
        if background.is_empty() {
            return Err(AttributionError::EmptyBackground);
        }
        if settings.permutations == 0 {
            return Err(AttributionError::NoPermutations);
        }
        let scored_rows = background
            .len()
            .checked_mul(settings.permutations)
            .and_then(|walks| walks.checked_mul(FEATURE_COUNT));
        if !scored_rows.is_some_and(|rows| rows <= MAX_SCORED_ROWS) {
            return Err(AttributionError::TooLarge {
                background: background.len(),
                permutations: settings.permutations,
                max: MAX_SCORED_ROWS,
            });
        }
        if classifier.num_features() != FEATURE_COUNT {
            return Err(AttributionError::FeatureCount {
                expected: FEATURE_COUNT,
                actual: classifier.num_features(),
            });
        }

        let background_outputs = log_odds(classifier.as_ref(), &to_batch(&background))?;
        let expected_value = background_outputs.iter().sum::<f64>() / background_outputs.len() as f64;

        tracing::info!(
            background_rows = background.len(),
            permutations = settings.permutations,
            expected_value,
            "Attribution engine ready"
        );

        Ok(Self {
            classifier,
            background,
            background_outputs,
            expected_value,
            settings,
        })
    }
}

impl Attributor for SamplingShapley {
    fn expected_value(&self) -> f64 {
        self.expected_value
    }

    fn output(&self, instance: &NormalizedVector) -> Result<f64, AttributionError> {
        let outputs = log_odds(self.classifier.as_ref(), &to_batch(std::slice::from_ref(instance)))?;
        Ok(outputs[0])
    }

    fn attribute(&self, instance: &NormalizedVector) -> Result<Vec<AttributionScore>, AttributionError> {
        let start_time = Instant::now();
        let walks = self.background.len() * self.settings.permutations;

        // Fresh generator per call: same instance, same scores
        let mut rng = StdRng::seed_from_u64(self.settings.seed);
        let mut order: Vec<usize> = (0..FEATURE_COUNT).collect();
        let mut orders = Vec::with_capacity(walks);
        let mut hybrids = Array2::<f32>::zeros((walks * FEATURE_COUNT, FEATURE_COUNT));

        let mut row_idx = 0;
        for (b, base) in self.background.iter().enumerate() {
            for _ in 0..self.settings.permutations {
                order.shuffle(&mut rng);
                let mut current = base.values;
                for &feature in &order {
                    current[feature] = instance.values[feature];
                    for (cell, value) in hybrids.row_mut(row_idx).iter_mut().zip(current.iter()) {
                        *cell = *value;
                    }
                    row_idx += 1;
                }
                orders.push((b, order.clone()));
            }
        }

        let outputs = log_odds(self.classifier.as_ref(), &hybrids)?;

        let mut totals = [0.0f64; FEATURE_COUNT];
        for (walk, (b, order)) in orders.iter().enumerate() {
            let mut previous = self.background_outputs[*b];
            for (step, &feature) in order.iter().enumerate() {
                let current = outputs[walk * FEATURE_COUNT + step];
                totals[feature] += current - previous;
                previous = current;
            }
        }

        let scores: Vec<AttributionScore> = Feature::ALL
            .iter()
            .map(|f| AttributionScore {
                feature: *f,
                contribution: totals[f.index()] / walks as f64,
            })
            .collect();

        tracing::debug!(
            rows_scored = walks * FEATURE_COUNT,
            elapsed_ms = start_time.elapsed().as_millis() as u64,
            "Attribution computed"
        );

        Ok(scores)
    }
}

fn log_odds(classifier: &dyn Classifier, batch: &Array2<f32>) -> Result<Vec<f64>, AttributionError> {
    let positives = classifier.predict_positive(batch.view())?;
    if positives.len() != batch.nrows() {
        return Err(InferenceError::OutputLength { expected: batch.nrows(), actual: positives.len() }.into());
    }
    let outputs: Vec<f64> = positives.into_iter().map(logit).collect();
    if outputs.iter().any(|v| !v.is_finite()) {
        return Err(AttributionError::NonFinite);
    }
    Ok(outputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::fixtures;
    use ndarray::ArrayView2;

    fn sum(scores: &[AttributionScore]) -> f64 {
        scores.iter().map(|s| s.contribution).sum()
    }

    fn contribution(scores: &[AttributionScore], feature: Feature) -> f64 {
        scores.iter().find(|s| s.feature == feature).unwrap().contribution
    }

    /// Logistic model with an interaction term, so permutations disagree
    struct Interacting;

    impl Classifier for Interacting {
        fn name(&self) -> &str {
            "interacting"
        }
        fn num_features(&self) -> usize {
            FEATURE_COUNT
        }
        fn predict_positive(&self, batch: ArrayView2<'_, f32>) -> Result<Vec<f64>, InferenceError> {
            Ok(batch
                .rows()
                .into_iter()
                .map(|r| {
                    let margin = 0.8 * r[0] as f64 - 1.5 * r[5] as f64 + 2.0 * (r[3] * r[7]) as f64 + 0.3 * r[21] as f64;
                    crate::logic::model::inference::sigmoid(margin)
                })
                .collect())
        }
    }

    #[test]
    fn test_additive_consistency_on_fixture_model() {
        let engine = fixtures::attributor();
        let preprocessor = fixtures::preprocessor();

        for raw in [fixtures::healthy_raw(), fixtures::parkinsons_raw()] {
            let (_, x) = preprocessor.prepare(&raw).unwrap();
            let scores = engine.attribute(&x).unwrap();
            assert_eq!(scores.len(), FEATURE_COUNT);

            let deviation = engine.output(&x).unwrap() - engine.expected_value();
            assert!((sum(&scores) - deviation).abs() <= ADDITIVITY_TOLERANCE);
        }
    }

    #[test]
    fn test_single_feature_trees_get_exact_credit() {
        let engine = fixtures::attributor();
        let (_, x) = fixtures::preprocessor().prepare(&fixtures::healthy_raw()).unwrap();
        let scores = engine.attribute(&x).unwrap();

        // Each stump depends on one feature, so credit is its leaf difference
        assert!((contribution(&scores, Feature::Ppe) - (-2.2)).abs() < 1e-4);
        assert!((contribution(&scores, Feature::Spread1) - (-1.7)).abs() < 1e-4);
        assert!((contribution(&scores, Feature::Hnr) - (-1.1)).abs() < 1e-4);
        assert!(contribution(&scores, Feature::MdvpFoHz).abs() < 1e-9);
    }

    #[test]
    fn test_additive_consistency_with_interactions_and_background() {
        let background: Vec<NormalizedVector> = (0..3)
            .map(|i| NormalizedVector::from_values([i as f32 * 0.3 - 0.4; FEATURE_COUNT]))
            .collect();
        let engine = SamplingShapley::new(
            Arc::new(Interacting),
            background,
            ShapleySettings { permutations: 5, seed: 11 },
        ).unwrap();

        let mut values = [0.1f32; FEATURE_COUNT];
        values[0] = 0.9;
        values[3] = -0.7;
        values[5] = 0.4;
        values[7] = 0.8;
        let x = NormalizedVector::from_values(values);

        let scores = engine.attribute(&x).unwrap();
        let deviation = engine.output(&x).unwrap() - engine.expected_value();
        assert!((sum(&scores) - deviation).abs() <= ADDITIVITY_TOLERANCE);

        // Features the model ignores get nothing
        assert!(contribution(&scores, Feature::Dfa).abs() < 1e-12);
    }

    #[test]
    fn test_attribution_is_deterministic() {
        let engine = SamplingShapley::new(
            Arc::new(Interacting),
            vec![NormalizedVector::zeros()],
            ShapleySettings::default(),
        ).unwrap();
        let x = NormalizedVector::from_values([0.5; FEATURE_COUNT]);

        assert_eq!(engine.attribute(&x).unwrap(), engine.attribute(&x).unwrap());
    }

    #[test]
    fn test_construction_failures() {
        let classifier: Arc<dyn Classifier> = Arc::new(fixtures::ensemble());

        assert!(matches!(
            SamplingShapley::new(classifier.clone(), vec![], ShapleySettings::default()),
            Err(AttributionError::EmptyBackground)
        ));
        assert!(matches!(
            SamplingShapley::new(
                classifier,
                vec![NormalizedVector::zeros()],
                ShapleySettings { permutations: 0, seed: 1 }
            ),
            Err(AttributionError::NoPermutations)
        ));
    }

    #[test]
    fn test_oversized_sampling_is_rejected() {
        let classifier: Arc<dyn Classifier> = Arc::new(fixtures::ensemble());

        // Largest permutation count that still fits one background row
        let fits = MAX_SCORED_ROWS / FEATURE_COUNT;
        assert!(SamplingShapley::new(
            classifier.clone(),
            vec![NormalizedVector::zeros()],
            ShapleySettings { permutations: fits, seed: 1 }
        ).is_ok());

        assert!(matches!(
            SamplingShapley::new(
                classifier.clone(),
                vec![NormalizedVector::zeros(); 2],
                ShapleySettings { permutations: fits, seed: 1 }
            ),
            Err(AttributionError::TooLarge { background: 2, .. })
        ));
        assert!(matches!(
            SamplingShapley::new(
                classifier,
                vec![NormalizedVector::zeros()],
                ShapleySettings { permutations: usize::MAX, seed: 1 }
            ),
            Err(AttributionError::TooLarge { .. })
        ));
    }
}
