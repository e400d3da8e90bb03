use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::item::{ContentKind, ItemRecord, ItemStatus};
use crate::models::metadata::GeneratedMetadata;
use crate::services::dispatcher::DispatchReport;
use crate::services::state_store::BatchSummary;

/// One item as shown to API consumers.
#[derive(Debug, Serialize, Deserialize)]
pub struct ItemView {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub kind: ContentKind,
    pub status: ItemStatus,
    pub metadata: Option<GeneratedMetadata>,
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<ItemRecord> for ItemView {
    fn from(record: ItemRecord) -> Self {
        Self {
            status: record.state.status(),
            metadata: record.state.metadata().cloned(),
            error: record.state.error().map(str::to_string),
            id: record.item.id,
            file_name: record.item.file_name,
            mime_type: record.item.mime_type,
            kind: record.item.kind,
            updated_at: record.updated_at,
        }
    }
}

/// Response for upload and status queries.
#[derive(Debug, Serialize)]
pub struct BatchResponse {
    pub batch_id: Uuid,
    pub generating: bool,
    pub export_ready: bool,
    pub progress_percent: f64,
    pub remaining: usize,
    pub summary: BatchSummary,
    pub items: Vec<ItemView>,
}

/// Request to run a dispatch round. Omitted fields fall back to server defaults.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct GenerateRequest {
    /// Raw key field: keys separated by commas or newlines.
    #[garde(skip)]
    pub api_keys: Option<String>,

    #[garde(skip)]
    pub content_type: Option<ContentKind>,

    #[garde(range(min = 5, max = 200))]
    pub title_length: Option<u32>,

    #[garde(range(min = 5, max = 50))]
    pub keyword_count: Option<u32>,
}

/// Response after a dispatch round finished.
#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub batch_id: Uuid,
    #[serde(flatten)]
    pub report: DispatchReport,
    pub all_succeeded: bool,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
