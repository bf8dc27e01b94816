//! Narrative Generator - plain-language summary via an Ollama-style endpoint
//!
//! Ranking and prompt construction are deterministic. The remote call is a
//! single non-streaming request bounded by the client timeout; any failure
//! yields [`FALLBACK_NARRATIVE`].

use std::cmp::Ordering;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::types::AttributionScore;
use crate::logic::features::{Feature, FeatureRecord};

/// Returned whenever the remote model cannot produce text
pub const FALLBACK_NARRATIVE: &str = "Narrative explanation is currently unavailable.";

/// Factors named in the prompt
pub const TOP_FEATURES: usize = 4;

#[derive(Debug, Clone)]
pub struct NarrativeSettings {
    pub url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, thiserror::Error)]
enum NarrativeError {
    #[error("request timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned {0}")]
    Status(u16),
    #[error("malformed response: {0}")]
    Parse(String),
    #[error("empty response")]
    Empty,
}

impl From<reqwest::Error> for NarrativeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            NarrativeError::Timeout
        } else if err.is_decode() {
            NarrativeError::Parse(err.to_string())
        } else {
            NarrativeError::Network(err.to_string())
        }
    }
}

/// A feature paired with its measured value and its score
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureImpact {
    pub feature: Feature,
    pub value: f64,
    pub contribution: f64,
}

/// Most influential features first (by |contribution|), at most `limit`.
/// Ties keep canonical order.
pub fn rank_impacts(record: &FeatureRecord, scores: &[AttributionScore], limit: usize) -> Vec<FeatureImpact> {
    let mut impacts: Vec<FeatureImpact> = scores
        .iter()
        .map(|s| FeatureImpact {
            feature: s.feature,
            value: record.get(s.feature),
            contribution: s.contribution,
        })
        .collect();

    impacts.sort_by(|a, b| {
        b.contribution
            .abs()
            .partial_cmp(&a.contribution.abs())
            .unwrap_or(Ordering::Equal)
    });
    impacts.truncate(limit.min(impacts.len()));
    impacts
}

pub fn build_prompt(impacts: &[FeatureImpact]) -> String {
    let mut prompt = String::from(
        "You are a medical assistant explaining the result of a Parkinson's disease screening model \
         to a person who is not a data scientist.\n\n\
         The model analyzed voice measurements to make its prediction. In 2-3 simple sentences, \
         explain which factors influenced the result the most.\n\
         Do not mention SHAP values, attribution scores or any other technical scoring terms. \
         Instead, say whether a measurement \"strongly suggested\" or \"pushed the prediction towards\" an outcome.\n\n\
         The most important factors for this prediction:\n",
    );

    for (rank, impact) in impacts.iter().enumerate() {
        prompt.push_str(&format!(
            "{}. Feature: '{}' with a value of {:.2}.",
            rank + 1,
            impact.feature.wire_name(),
            impact.value
        ));
        if rank == 0 {
            prompt.push_str(" This was the most significant factor.");
        }
        prompt.push('\n');
    }

    prompt.push_str("\nBased on this, write the simple explanation.");
    prompt
}

/// Shares one pooled client; concurrent calls get separate connections.
#[derive(Debug, Clone)]
pub struct NarrativeGenerator {
    http_client: reqwest::Client,
    url: String,
    model: String,
}

impl NarrativeGenerator {
    pub fn new(settings: NarrativeSettings) -> Result<Self, reqwest::Error> {
        let http_client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http_client,
            url: settings.url,
            model: settings.model,
        })
    }

    /// Never fails; returns [`FALLBACK_NARRATIVE`] when the remote model can't answer
    pub async fn narrate(&self, record: &FeatureRecord, scores: &[AttributionScore]) -> String {
        let impacts = rank_impacts(record, scores, TOP_FEATURES);
        if impacts.is_empty() {
            return FALLBACK_NARRATIVE.to_string();
        }

        let prompt = build_prompt(&impacts);
        match self.generate(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, url = %self.url, "Narrative generation failed, using fallback");
                FALLBACK_NARRATIVE.to_string()
            }
        }
    }

    async fn generate(&self, prompt: &str) -> Result<String, NarrativeError> {
        let payload = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self.http_client
            .post(&self.url)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(NarrativeError::Status(response.status().as_u16()));
        }

        let body: GenerateResponse = response.json().await?;
        let text = body.response.trim();
        if text.is_empty() {
            return Err(NarrativeError::Empty);
        }
        Ok(text.to_string())
    }
}
