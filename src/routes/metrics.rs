use axum::extract::State;
use axum::response::IntoResponse;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

/// Prometheus metrics scrape endpoint.
pub async fn prometheus_metrics(State(handle): State<Arc<PrometheusHandle>>) -> impl IntoResponse {
    handle.render()
}

/// Register descriptions for the metrics the runner records.
pub fn describe_metrics() {
    metrics::describe_histogram!(
        "metadata_generation_seconds",
        "Time spent encoding and generating metadata for one item"
    );
    metrics::describe_counter!(
        "metadata_items_completed",
        "Items that reached success"
    );
    metrics::describe_counter!(
        "metadata_items_failed",
        "Items that ended a round failed"
    );
    metrics::describe_gauge!(
        "metadata_items_in_flight",
        "Items currently awaiting the remote model"
    );
}
