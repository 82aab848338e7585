//! AsthmaShield - Inference Server

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use asthma_shield_backend::{
    config::Config, create_app, external::OpenWeatherClient, model::load_artifact,
    services::PredictionPipeline, AppState,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "asthma_server=debug,asthma_shield_backend=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    tracing::info!("Starting AsthmaShield Inference Server");
    tracing::info!("Environment: {}", config.environment);

    // The service refuses to start without a usable model
    tracing::info!("Loading model artifact from {}", config.model.artifact_path);
    let model = load_artifact(&config.model.artifact_path)
        .with_context(|| format!("failed to load model artifact {}", config.model.artifact_path))?;
    tracing::info!(
        version = %model.version(),
        family = %model.family(),
        digest = %model.metadata.digest,
        "Model loaded"
    );

    if config.weather.api_key.is_empty() {
        tracing::warn!("No weather API key configured; live lookups will fail");
    }
    let provider = OpenWeatherClient::with_base_url(
        config.weather.api_key.clone(),
        config.weather.api_endpoint.clone(),
    )
    .with_default_pollen_level(config.weather.default_pollen_level);

    let pipeline = PredictionPipeline::from_config(Arc::new(model), provider, &config);

    let host: std::net::IpAddr = config
        .server
        .host
        .parse()
        .with_context(|| format!("invalid server host {}", config.server.host))?;
    let addr = SocketAddr::new(host, config.server.port);

    let app = create_app(AppState::new(config, pipeline));

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
