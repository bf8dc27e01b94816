//! Shared test fixtures
//!
//! A small three-tree ensemble over PPE, spread1 and HNR, a scaler fitted on
//! the dataset ranges, two real recordings and a stand-in text-generation
//! server.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::config::Config;
use crate::logic::context::{build_attributor, ModelContext};
use crate::logic::explain::{Attributor, NarrativeGenerator, NarrativeSettings, SamplingShapley, ShapleySettings};
use crate::logic::features::layout::wire_names;
use crate::logic::features::{Feature, RawRecord, FEATURE_COUNT};
use crate::logic::model::scaler::ScalerArtifact;
use crate::logic::model::{Classifier, GradientBoostedTrees, MinMaxScaler, NormalizedVector, Predictor, Preprocessor};
use crate::logic::service::PredictionService;

// ============================================================================
// RECORDINGS
// ============================================================================

/// phon_R01_S07_1 (status 0)
const HEALTHY: [f64; FEATURE_COUNT] = [
    197.076, 206.896, 192.055, 0.00289, 0.00001, 0.00166, 0.00168, 0.00498, 0.01098, 0.097, 0.00563, 0.0068,
    0.00802, 0.01689, 0.00339, 26.775, 0.422229, 0.741367, -7.3483, 0.177551, 1.743867, 0.085569,
];

/// phon_R01_S01_1 (status 1)
const PARKINSONS: [f64; FEATURE_COUNT] = [
    119.992, 157.302, 74.997, 0.00784, 0.00007, 0.0037, 0.00554, 0.01109, 0.04374, 0.426, 0.02182, 0.0313,
    0.02971, 0.06545, 0.02211, 21.033, 0.414783, 0.815285, -4.813031, 0.266482, 2.301442, 0.284654,
];

const DATA_MIN: [f64; FEATURE_COUNT] = [
    88.333, 102.145, 65.476, 0.00168, 0.000007, 0.00068, 0.00092, 0.00204, 0.00954, 0.085, 0.00455, 0.0057,
    0.00719, 0.01364, 0.00065, 8.441, 0.25657, 0.574282, -7.964984, 0.006274, 1.423287, 0.044539,
];

const DATA_MAX: [f64; FEATURE_COUNT] = [
    260.105, 592.03, 239.17, 0.03316, 0.00026, 0.02144, 0.01958, 0.06433, 0.11908, 1.302, 0.05647, 0.0794,
    0.13778, 0.16942, 0.31482, 33.047, 0.685151, 0.825288, -2.434031, 0.450493, 3.671155, 0.527367,
];

fn raw_from(values: &[f64; FEATURE_COUNT]) -> RawRecord {
    Feature::ALL
        .iter()
        .map(|f| (f.wire_name().to_string(), json!(values[f.index()])))
        .collect()
}

pub fn healthy_raw() -> RawRecord {
    let mut raw = raw_from(&HEALTHY);
    raw.insert("name".into(), json!("phon_R01_S07_1"));
    raw
}

pub fn parkinsons_raw() -> RawRecord {
    let mut raw = raw_from(&PARKINSONS);
    raw.insert("name".into(), json!("phon_R01_S01_1"));
    raw
}

// ============================================================================
// ARTIFACTS
// ============================================================================

pub fn scaler_artifact() -> ScalerArtifact {
    ScalerArtifact::Ranges {
        feature_names: wire_names().map(String::from).collect(),
        data_min: DATA_MIN.to_vec(),
        data_max: DATA_MAX.to_vec(),
        feature_range: (-1.0, 1.0),
    }
}

pub fn preprocessor() -> Preprocessor {
    Preprocessor::new(MinMaxScaler::from_artifact(scaler_artifact()).unwrap())
}

fn stump(feature: Feature, threshold: f32, left: f32, right: f32) -> Value {
    json!({
        "base_weights": [0.0, left, right],
        "categories": [],
        "default_left": [1, 0, 0],
        "id": 0,
        "left_children": [1, -1, -1],
        "right_children": [2, -1, -1],
        "parents": [2147483647, 0, 0],
        "split_conditions": [threshold, left, right],
        "split_indices": [feature.index(), 0, 0],
        "split_type": [0, 0, 0],
        "sum_hessian": [10.0, 5.0, 5.0],
        "loss_changes": [1.0, 0.0, 0.0],
        "tree_param": { "num_deleted": "0", "num_feature": "22", "num_nodes": "3", "size_leaf_vector": "1" }
    })
}

/// Healthy margin -2.6, parkinsons margin 2.4, all-zeros margin 2.4
pub fn ensemble_json() -> String {
    let trees = vec![
        stump(Feature::Ppe, -0.3, -1.2, 1.0),
        stump(Feature::Spread1, -0.2, -0.8, 0.9),
        stump(Feature::Hnr, 0.1, 0.5, -0.6),
    ];
    json!({
        "learner": {
            "attributes": {},
            "feature_names": wire_names().collect::<Vec<_>>(),
            "gradient_booster": {
                "model": { "gbtree_model_param": { "num_trees": "3" }, "trees": trees, "tree_info": [0, 0, 0] },
                "name": "gbtree"
            },
            "learner_model_param": { "base_score": "5E-1", "num_class": "0", "num_feature": "22", "num_target": "1" },
            "objective": { "name": "binary:logistic", "reg_loss_param": { "scale_pos_weight": "1" } }
        },
        "version": [2, 0, 3]
    })
    .to_string()
}

pub fn ensemble() -> GradientBoostedTrees {
    GradientBoostedTrees::from_json_str(&ensemble_json()).unwrap()
}

pub fn classifier() -> Arc<dyn Classifier> {
    Arc::new(ensemble())
}

pub fn predictor() -> Predictor {
    Predictor::new(classifier())
}

/// Single all-zeros background row
pub fn attributor() -> SamplingShapley {
    SamplingShapley::new(classifier(), vec![NormalizedVector::zeros()], ShapleySettings::default()).unwrap()
}

/// Scaler and model written to a temp dir, config pointing at them
pub fn artifact_config() -> (tempfile::TempDir, Config) {
    let dir = tempfile::tempdir().unwrap();
    let scaler_path = dir.path().join("parkinsons_scaler.json");
    let model_path = dir.path().join("parkinsons_model.json");
    std::fs::write(&scaler_path, serde_json::to_string(&scaler_artifact()).unwrap()).unwrap();
    std::fs::write(&model_path, ensemble_json()).unwrap();

    let config = Config {
        model_path,
        scaler_path,
        ..Config::default()
    };
    (dir, config)
}

pub fn service_with(narrator: NarrativeGenerator, with_attribution: bool) -> PredictionService {
    let attributor: Option<Arc<dyn Attributor>> = if with_attribution {
        build_attributor(classifier(), vec![NormalizedVector::zeros()], ShapleySettings::default())
    } else {
        None
    };
    let context = ModelContext::new(preprocessor(), classifier(), attributor, Vec::new());
    PredictionService::new(context, narrator)
}

pub fn service(with_attribution: bool) -> PredictionService {
    service_with(unreachable_narrator(), with_attribution)
}

// ============================================================================
// TEXT GENERATION
// ============================================================================

/// Nothing listens on port 1; connections are refused immediately
pub fn unreachable_narrator() -> NarrativeGenerator {
    NarrativeGenerator::new(NarrativeSettings {
        url: "http://127.0.0.1:1/api/generate".to_string(),
        model: "phi3:mini".to_string(),
        timeout: Duration::from_secs(2),
    })
    .unwrap()
}

#[derive(Debug, Clone)]
pub enum LlmBehavior {
    /// 200 with this body
    Reply(Value),
    Status(u16),
    /// Hold the request this long before answering
    Stall(Duration),
}

#[derive(Clone)]
struct MockState {
    behavior: LlmBehavior,
    last_request: Arc<Mutex<Option<Value>>>,
}

pub struct MockLlm {
    url: String,
    last_request: Arc<Mutex<Option<Value>>>,
}

impl MockLlm {
    pub async fn spawn(behavior: LlmBehavior) -> Self {
        let last_request = Arc::new(Mutex::new(None));
        let state = MockState {
            behavior,
            last_request: last_request.clone(),
        };
        let app = Router::new().route("/api/generate", post(generate)).with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            url: format!("http://{}/api/generate", addr),
            last_request,
        }
    }

    pub fn narrator(&self, timeout: Duration) -> NarrativeGenerator {
        NarrativeGenerator::new(NarrativeSettings {
            url: self.url.clone(),
            model: "phi3:mini".to_string(),
            timeout,
        })
        .unwrap()
    }

    pub fn last_request(&self) -> Option<Value> {
        self.last_request.lock().unwrap().clone()
    }
}

async fn generate(State(state): State<MockState>, Json(body): Json<Value>) -> Response {
    *state.last_request.lock().unwrap() = Some(body);

    match state.behavior {
        LlmBehavior::Reply(reply) => Json(reply).into_response(),
        LlmBehavior::Status(code) => StatusCode::from_u16(code)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            .into_response(),
        LlmBehavior::Stall(delay) => {
            tokio::time::sleep(delay).await;
            Json(json!({ "response": "too late" })).into_response()
        }
    }
}
