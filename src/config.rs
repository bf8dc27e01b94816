//! Configuration module

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::logic::explain::{NarrativeSettings, ShapleySettings};

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Fitted classifier (XGBoost JSON, or .onnx with the `onnx` feature)
    pub model_path: PathBuf,

    /// Fitted min-max scaler
    pub scaler_path: PathBuf,

    /// Optional attribution background rows
    pub background_path: Option<PathBuf>,

    /// Text-generation endpoint
    pub ollama_url: String,

    /// Model requested from the text-generation endpoint
    pub ollama_model: String,

    /// Upper bound for one narrative request
    pub narrative_timeout_secs: u64,

    /// Set to false to serve mock explanations only
    pub attribution_enabled: bool,

    pub attribution_permutations: usize,

    pub attribution_seed: u64,

    /// Allowed CORS origins
    pub cors_origins: Vec<String>,

    /// Environment (development, production)
    pub environment: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),

            model_path: env::var("MODEL_PATH")
                .unwrap_or_else(|_| "artifacts/parkinsons_model.json".to_string())
                .into(),

            scaler_path: env::var("SCALER_PATH")
                .unwrap_or_else(|_| "artifacts/parkinsons_scaler.json".to_string())
                .into(),

            background_path: env::var("BACKGROUND_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),

            ollama_url: env::var("OLLAMA_URL")
                .unwrap_or_else(|_| "http://localhost:11434/api/generate".to_string()),

            ollama_model: env::var("OLLAMA_MODEL")
                .unwrap_or_else(|_| "phi3:mini".to_string()),

            narrative_timeout_secs: env::var("NARRATIVE_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .filter(|t| *t > 0)
                .unwrap_or(700),

            attribution_enabled: env::var("ATTRIBUTION_ENABLED")
                .ok()
                .and_then(|v| parse_bool(&v))
                .unwrap_or(true),

            attribution_permutations: env::var("ATTRIBUTION_PERMUTATIONS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(32),

            attribution_seed: env::var("ATTRIBUTION_SEED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),

            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| parse_list(&v))
                .unwrap_or_else(|_| default_origins()),

            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string()),
        }
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    pub fn narrative_settings(&self) -> NarrativeSettings {
        NarrativeSettings {
            url: self.ollama_url.clone(),
            model: self.ollama_model.clone(),
            timeout: Duration::from_secs(self.narrative_timeout_secs),
        }
    }

    pub fn shapley_settings(&self) -> ShapleySettings {
        ShapleySettings {
            permutations: self.attribution_permutations,
            seed: self.attribution_seed,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8000,
            model_path: "artifacts/parkinsons_model.json".into(),
            scaler_path: "artifacts/parkinsons_scaler.json".into(),
            background_path: None,
            ollama_url: "http://localhost:11434/api/generate".to_string(),
            ollama_model: "phi3:mini".to_string(),
            narrative_timeout_secs: 700,
            attribution_enabled: true,
            attribution_permutations: 32,
            attribution_seed: 7,
            cors_origins: default_origins(),
            environment: "development".to_string(),
        }
    }
}

fn default_origins() -> Vec<String> {
    [
        "http://localhost",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:3001",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
