pub mod batch;
pub mod health;
pub mod metrics;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;

/// API routes with the shared middleware stack. `/metrics` is served when a
/// Prometheus handle is supplied.
pub fn router(
    state: AppState,
    max_upload_bytes: usize,
    prometheus: Option<Arc<PrometheusHandle>>,
) -> Router {
    let mut app = Router::new()
        .route("/health", get(health::health_check))
        .route("/api/v1/batch", post(batch::upload_batch).get(batch::get_batch))
        .route("/api/v1/batch/generate", post(batch::generate))
        .route("/api/v1/batch/export", get(batch::export_batch))
        .with_state(state);

    if let Some(handle) = prometheus {
        app = app.route(
            "/metrics",
            get(metrics::prometheus_metrics).with_state(handle),
        );
    }

    app.layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
}
