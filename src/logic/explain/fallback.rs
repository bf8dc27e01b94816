//! Mock explanation used whenever the attribution path is unavailable.
//! Pure function of the outcome: no I/O, cannot fail.

use super::types::{AttributionScore, Explanation};
use crate::logic::features::Feature;
use crate::logic::model::PredictionOutcome;

/// Canonical subset with signs as seen for a Parkinson's prediction
const MOCK_SCORES: [(Feature, f64); 4] = [
    (Feature::Ppe, 0.15),
    (Feature::Spread1, 0.12),
    (Feature::Hnr, -0.08),
    (Feature::Dfa, -0.05),
];

pub fn mock_explanation(outcome: &PredictionOutcome) -> Explanation {
    let sign = if outcome.is_parkinsons() { 1.0 } else { -1.0 };

    let shap_values = MOCK_SCORES
        .iter()
        .map(|(feature, contribution)| AttributionScore {
            feature: *feature,
            contribution: sign * contribution,
        })
        .collect();

    let narrative = if outcome.is_parkinsons() {
        format!(
            "The model predicts a {:.1}% probability of Parkinson's disease based on voice analysis patterns.",
            outcome.probability_parkinsons * 100.0
        )
    } else {
        format!(
            "The model predicts a {:.1}% probability of healthy voice patterns.",
            outcome.probability_healthy * 100.0
        )
    };

    Explanation { shap_values, narrative }
}
