use metrics_exporter_prometheus::PrometheusBuilder;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use stock_metadata_gen::{
    app_state::AppState,
    config::AppConfig,
    routes,
    services::{dispatcher::Dispatcher, gemini::GeminiClientFactory},
};

#[tokio::main]
async fn main() {
    // Initialize structured logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    // Load configuration from environment
    let config = AppConfig::from_env().expect("Failed to load configuration from environment");

    let settings = config
        .validated_settings()
        .expect("Invalid generation settings in environment");

    tracing::info!("Initializing stock-metadata-gen server");

    // Initialize Prometheus metrics recorder
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("Failed to install Prometheus metrics recorder");
    let prometheus_handle = Arc::new(prometheus_handle);
    routes::metrics::describe_metrics();

    let default_keys = config.api_keys();
    if default_keys.is_empty() {
        tracing::warn!("No GEMINI_API_KEYS configured; requests must supply their own keys");
    } else {
        tracing::info!(keys = default_keys.len(), "Loaded Gemini API keys");
    }

    tracing::info!(model = %config.gemini_model, "Initializing Gemini client factory");
    let clients = Arc::new(GeminiClientFactory::new(
        &config.gemini_base_url,
        &config.gemini_model,
    ));

    let dispatcher = Dispatcher::with_max_concurrency(config.max_concurrency);
    let state = AppState::new(
        dispatcher,
        clients,
        settings,
        default_keys,
    );

    let app = routes::router(state, config.max_upload_bytes, Some(prometheus_handle));

    tracing::info!("Starting stock-metadata-gen on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Server error");
}
