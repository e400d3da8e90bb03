use std::sync::Arc;

use axum::extract::{Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use garde::Validate;

use crate::app_state::AppState;
use crate::models::api::{BatchResponse, ErrorResponse, GenerateRequest, GenerateResponse, ItemView};
use crate::models::settings::GenerationSettings;
use crate::services::batch::BatchRun;
use crate::services::credentials::{parse_api_keys, CredentialPool};
use crate::services::dispatcher::DispatchError;
use crate::services::export::{export_csv, ExportError, EXPORT_FILE_NAME};
use crate::services::upload::{item_from_upload, UploadError};

pub type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

fn busy() -> ApiError {
    api_error(StatusCode::CONFLICT, "Metadata generation is in progress")
}

fn upload_error(e: UploadError) -> ApiError {
    let status = match e {
        UploadError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        _ => StatusCode::BAD_REQUEST,
    };
    api_error(status, e.to_string())
}

async fn batch_response(state: &AppState) -> BatchResponse {
    let run = state.run.read().await.clone();
    let summary = run.store.summary().await;
    let items = run.store.list().await.into_iter().map(ItemView::from).collect();

    BatchResponse {
        batch_id: run.id,
        generating: state.is_generating(),
        export_ready: summary.all_succeeded(),
        progress_percent: summary.progress_percent(),
        remaining: summary.remaining(),
        summary,
        items,
    }
}

/// POST /api/v1/batch — Replace the current batch with uploaded files.
pub async fn upload_batch(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<BatchResponse>, ApiError> {
    let _guard = state.begin_generation().ok_or_else(busy)?;

    let mut items = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(UploadError::Malformed(e.body_text())))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let declared = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| upload_error(UploadError::Malformed(e.body_text())))?;

        items.push(item_from_upload(
            items.len(),
            &file_name,
            declared.as_deref(),
            data.to_vec(),
        )
        .map_err(upload_error)?);
    }

    if items.is_empty() {
        return Err(upload_error(UploadError::NoFiles));
    }

    let run = BatchRun::new(items)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
    let count = run.store.len().await;
    tracing::info!(batch_id = %run.id, items = count, "Batch uploaded");
    *state.run.write().await = run;

    Ok(Json(batch_response(&state).await))
}

/// GET /api/v1/batch — Current items, their states and overall progress.
pub async fn get_batch(State(state): State<AppState>) -> Json<BatchResponse> {
    Json(batch_response(&state).await)
}

/// POST /api/v1/batch/generate — Run one dispatch round over eligible items.
pub async fn generate(
    State(state): State<AppState>,
    Json(request): Json<GenerateRequest>,
) -> Result<Json<GenerateResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;

    let guard = state.begin_generation().ok_or_else(busy)?;

    let settings = GenerationSettings {
        content_type: request.content_type.unwrap_or(state.defaults.content_type),
        title_length: request.title_length.unwrap_or(state.defaults.title_length),
        keyword_count: request.keyword_count.unwrap_or(state.defaults.keyword_count),
        categories: state.defaults.categories.clone(),
    };

    let keys = match request.api_keys.as_deref() {
        Some(raw) => parse_api_keys(raw),
        None => state.default_keys.as_ref().clone(),
    };

    let run = state.run.read().await.clone();
    let pool = Arc::new(CredentialPool::new(keys, state.clients.clone()));
    let dispatcher = Arc::clone(&state.dispatcher);
    let store = Arc::clone(&run.store);

    // The round owns the guard: the batch stays claimed until every runner
    // has joined, even if this request is dropped.
    let round = tokio::spawn(async move {
        let _guard = guard;
        dispatcher.dispatch(store, pool, &settings).await
    });

    let report = round
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Dispatch round aborted");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Dispatch round aborted")
        })?
        .map_err(|e| match e {
            DispatchError::NothingToProcess => api_error(StatusCode::CONFLICT, e.to_string()),
            DispatchError::NoCredentials => api_error(StatusCode::BAD_REQUEST, e.to_string()),
        })?;

    let all_succeeded = report.all_succeeded();
    Ok(Json(GenerateResponse {
        batch_id: run.id,
        report,
        all_succeeded,
        message: all_succeeded.then(|| "All metadata generated successfully!".to_string()),
    }))
}

/// GET /api/v1/batch/export — CSV of all metadata, once every item succeeded.
pub async fn export_batch(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if state.is_generating() {
        return Err(busy());
    }

    let run = state.run.read().await.clone();
    let csv = export_csv(&run.store).await.map_err(|e| match e {
        ExportError::Incomplete { .. } => api_error(StatusCode::CONFLICT, e.to_string()),
        ExportError::Io(_) => api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv;charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        csv,
    ))
}
