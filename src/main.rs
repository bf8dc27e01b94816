//! Parkinson's voice screening server

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parkinsons_xai::logic::explain::NarrativeGenerator;
use parkinsons_xai::logic::{ModelContext, PredictionService};
use parkinsons_xai::{create_router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env();

    // Initialize logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "parkinsons_xai=debug,tower_http=debug".into());
    if config.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    tracing::info!("Parkinson's screening server starting...");
    tracing::info!(
        model = %config.model_path.display(),
        scaler = %config.scaler_path.display(),
        environment = %config.environment,
        "Configuration loaded"
    );

    // Load artifacts; a missing model or scaler is fatal
    let context = ModelContext::load(&config).context("Failed to load model artifacts")?;
    let model_info = context.info();

    let narrator = NarrativeGenerator::new(config.narrative_settings())
        .context("Failed to build narrative HTTP client")?;
    tracing::info!(url = %config.ollama_url, model = %config.ollama_model, "Narrative generator configured");

    // Build application state
    let state = AppState {
        service: Arc::new(PredictionService::new(context, narrator)),
        model_info: Arc::new(model_info),
        config: config.clone(),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
