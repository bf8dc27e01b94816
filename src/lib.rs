//! Parkinson's voice screening API
//!
//! Predicts Parkinson's disease from 22 voice measurements and explains
//! each prediction with per-feature attributions and a plain-language
//! narrative.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     PREDICTION SERVICE                       │
//! ├──────────────────────────────────────────────────────────────┤
//! │  record ─► Preprocessor ─► Predictor ─► ExplanationAssembler │
//! │                                            │            │    │
//! │                                   Attribution    Narrative   │
//! │                                   (Shapley)      (Ollama)    │
//! │                                            │                 │
//! │                                   mock fallback on failure   │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logic;
pub mod models;

use std::sync::Arc;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::Config;
pub use error::{AppError, AppResult};
use logic::{ModelInfo, PredictionService};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub model_info: Arc<ModelInfo>,
    pub config: Config,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        .route("/", get(handlers::health::root))
        .route("/health", get(handlers::health::check))
        .route("/predict", post(handlers::predict::predict))
        .route("/predict/", post(handlers::predict::predict))
        .route("/predict/batch", post(handlers::predict::predict_batch))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Any origin in development; the configured list in production
fn cors_layer(config: &Config) -> CorsLayer {
    let wildcard = config.cors_origins.iter().any(|o| o == "*");
    if !config.is_production() || wildcard {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::logic::fixtures;

    fn app(with_attribution: bool) -> Router {
        let service = fixtures::service(with_attribution);
        let model_info = ModelInfo {
            classifier: "xgboost-json".to_string(),
            explainer_available: service.explainer_available(),
            artifacts: Vec::new(),
        };
        create_router(AppState {
            service: Arc::new(service),
            model_info: Arc::new(model_info),
            config: Config::default(),
        })
    }

    async fn send(app: Router, method: &str, uri: &str, body: Option<String>) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.map(Body::from).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn test_root_and_health() {
        let (status, body) = send(app(true), "GET", "/", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");

        let (status, body) = send(app(false), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["explainer_available"], false);
        assert_eq!(body["classifier"], "xgboost-json");
        assert!(body["timestamp"].is_i64());
    }

    #[tokio::test]
    async fn test_predict_single_record() {
        let record = Value::Object(fixtures::parkinsons_raw()).to_string();

        for uri in ["/predict", "/predict/"] {
            let (status, body) = send(app(true), "POST", uri, Some(record.clone())).await;
            assert_eq!(status, StatusCode::OK);

            let results = body["results"].as_array().unwrap();
            assert_eq!(results.len(), 1);
            assert_eq!(results[0]["prediction"], 1);
            assert_eq!(results[0]["original_data"]["PPE"], 0.284654);
            assert_eq!(results[0]["explanation"]["shap_values"].as_array().unwrap().len(), 22);
            assert_eq!(results[0]["explanation"]["narrative"], "Narrative explanation is currently unavailable.");
        }
    }

    #[tokio::test]
    async fn test_predict_missing_field_is_bad_request() {
        let mut raw = fixtures::healthy_raw();
        raw.remove("HNR");

        let (status, body) = send(app(true), "POST", "/predict", Some(Value::Object(raw).to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
        assert!(body["error"].as_str().unwrap().contains("HNR"));
        assert!(body["detail"].as_str().unwrap().contains("HNR"));
    }

    #[tokio::test]
    async fn test_predict_malformed_body_is_bad_request() {
        let (status, body) = send(app(true), "POST", "/predict", Some("{ not json".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);

        let (status, _) = send(app(true), "POST", "/predict", Some("[1, 2, 3]".to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_in_input_order() {
        let body = json!({ "records": [fixtures::healthy_raw(), fixtures::parkinsons_raw()] }).to_string();
        let (status, body) = send(app(false), "POST", "/predict/batch", Some(body)).await;
        assert_eq!(status, StatusCode::OK);

        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["prediction"], 0);
        assert_eq!(results[1]["prediction"], 1);
        assert_eq!(results[1]["explanation"]["shap_values"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_batch_rejections() {
        let (status, _) = send(app(true), "POST", "/predict/batch", Some(json!({ "records": [] }).to_string())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let mut broken = fixtures::healthy_raw();
        broken.insert("DFA".into(), json!("high"));
        let body = json!({ "records": [fixtures::parkinsons_raw(), broken] }).to_string();
        let (status, body) = send(app(true), "POST", "/predict/batch", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "record 1: non-numeric fields: DFA");
    }
}
