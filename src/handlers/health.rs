//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;

use crate::logic::model::ArtifactInfo;
use crate::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    message: &'static str,
    status: &'static str,
}

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: i64,
    explainer_available: bool,
    classifier: String,
    artifacts: Vec<ArtifactInfo>,
}

pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Parkinson's voice screening API is running",
        status: "healthy",
    })
}

pub async fn check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now().timestamp(),
        explainer_available: state.model_info.explainer_available,
        classifier: state.model_info.classifier.clone(),
        artifacts: state.model_info.artifacts.clone(),
    })
}
