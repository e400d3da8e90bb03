use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::app_state::AppState;
use crate::services::state_store::BatchSummary;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub api_keys_configured: usize,
    pub generating: bool,
    pub batch: BatchSummary,
}

/// GET /health — liveness plus a snapshot of the current batch.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let run = state.run.read().await.clone();

    let response = HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            api_keys_configured: state.default_keys.len(),
            generating: state.is_generating(),
            batch: run.store.summary().await,
        },
    };

    (StatusCode::OK, Json(response))
}
