use std::sync::Arc;
use std::time::Instant;

use base64::Engine;
use tracing::{debug, error, info, warn};

use crate::models::item::{ItemState, ItemStatus, WorkItem};
use crate::models::metadata::{GeneratedMetadata, MetadataFields};
use crate::models::settings::GenerationSettings;
use crate::services::credentials::{Credential, CredentialPool};
use crate::services::gemini::{metadata_response_schema, GenerationError, GenerationRequest};
use crate::services::prompt::build_prompt;
use crate::services::state_store::ItemStateStore;

/// Upper bound on stored per-item error text, in characters.
pub const MAX_DIAGNOSTIC_CHARS: usize = 100;

pub const NO_CREDENTIAL_MESSAGE: &str = "No available API keys.";

/// Everything a runner needs that is shared across one dispatch round.
pub struct RoundContext {
    pub store: Arc<ItemStateStore>,
    pub pool: Arc<CredentialPool>,
    prompt: String,
    schema: serde_json::Value,
}

impl RoundContext {
    pub fn new(
        store: Arc<ItemStateStore>,
        pool: Arc<CredentialPool>,
        settings: &GenerationSettings,
    ) -> Self {
        Self {
            store,
            pool,
            prompt: build_prompt(settings),
            schema: metadata_response_schema(),
        }
    }
}

/// Cut `message` down to [`MAX_DIAGNOSTIC_CHARS`] characters.
pub fn truncate_diagnostic(message: &str) -> String {
    message.chars().take(MAX_DIAGNOSTIC_CHARS).collect()
}

/// Drive one item to a terminal state and report which one it reached.
///
/// Order within an item is fixed: issue a credential, mark `processing`, call
/// the model, write the terminal state. Failures never escape; they become the
/// item's `failed` state.
pub async fn run_item(item: &WorkItem, ctx: &RoundContext) -> ItemStatus {
    let Some(credential) = ctx.pool.issue().await else {
        warn!(item_id = %item.id, "No credential available for item");
        return finish(item, ctx, ItemState::Failed(NO_CREDENTIAL_MESSAGE.to_string())).await;
    };

    if let Err(e) = ctx.store.transition(&item.id, ItemState::Processing).await {
        error!(item_id = %item.id, error = %e, "Failed to mark item processing");
        return current_status(item, ctx).await;
    }

    debug!(item_id = %item.id, credential = %credential, "Item processing");
    let start = Instant::now();

    let outcome = {
        let _in_flight = InFlightGauge::enter();
        generate_metadata(item, &credential, ctx).await
    };

    metrics::histogram!("metadata_generation_seconds").record(start.elapsed().as_secs_f64());

    let next = match outcome {
        Ok(metadata) => {
            info!(
                item_id = %item.id,
                keywords = metadata.keywords.len(),
                category = %metadata.category,
                duration_ms = start.elapsed().as_millis() as u64,
                "Metadata generated"
            );
            metrics::counter!("metadata_items_completed").increment(1);
            ItemState::Success(metadata)
        }
        Err(e) => {
            warn!(item_id = %item.id, credential = %credential, error = %e, "Metadata generation failed");
            metrics::counter!("metadata_items_failed").increment(1);
            ItemState::Failed(truncate_diagnostic(&e.to_string()))
        }
    };

    finish(item, ctx, next).await
}

/// Holds one unit of `metadata_items_in_flight` until dropped, including
/// when the runner unwinds.
struct InFlightGauge;

impl InFlightGauge {
    fn enter() -> Self {
        metrics::gauge!("metadata_items_in_flight").increment(1.0);
        Self
    }
}

impl Drop for InFlightGauge {
    fn drop(&mut self) {
        metrics::gauge!("metadata_items_in_flight").decrement(1.0);
    }
}

async fn generate_metadata(
    item: &WorkItem,
    credential: &Credential,
    ctx: &RoundContext,
) -> Result<GeneratedMetadata, TaskError> {
    let bytes = item.payload.read().await?;
    let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);

    let client = ctx.pool.client_for(credential).await;
    let text = client
        .generate(&GenerationRequest {
            data: &encoded,
            mime_type: &item.mime_type,
            prompt: &ctx.prompt,
            response_schema: &ctx.schema,
        })
        .await?;

    let fields: MetadataFields = serde_json::from_str(&text)?;
    Ok(GeneratedMetadata::new(item.file_name.clone(), fields))
}

async fn finish(item: &WorkItem, ctx: &RoundContext, next: ItemState) -> ItemStatus {
    let status = next.status();
    match ctx.store.transition(&item.id, next).await {
        Ok(()) => status,
        Err(e) => {
            error!(item_id = %item.id, error = %e, "Failed to record item outcome");
            current_status(item, ctx).await
        }
    }
}

async fn current_status(item: &WorkItem, ctx: &RoundContext) -> ItemStatus {
    ctx.store
        .get(&item.id)
        .await
        .map(|record| record.state.status())
        .unwrap_or(ItemStatus::Failed)
}

/// Why a single item failed. Rendered into the item's diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Generation(#[from] GenerationError),

    #[error("Invalid metadata JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_diagnostic() {
        let long = "x".repeat(250);
        assert_eq!(truncate_diagnostic(&long).chars().count(), MAX_DIAGNOSTIC_CHARS);
        assert_eq!(truncate_diagnostic("short"), "short");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let wide = "é".repeat(150);
        let cut = truncate_diagnostic(&wide);
        assert_eq!(cut.chars().count(), 100);
        assert_eq!(cut.len(), 200);
    }

    fn in_flight_value(rendered: &str) -> Option<f64> {
        rendered
            .lines()
            .find_map(|line| line.strip_prefix("metadata_items_in_flight "))
            .and_then(|value| value.trim().parse().ok())
    }

    #[test]
    fn test_in_flight_gauge_released_when_runner_panics() {
        let recorder = metrics_exporter_prometheus::PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let _ = std::panic::catch_unwind(|| {
                let _in_flight = InFlightGauge::enter();
                panic!("runner died mid-call");
            });
        });

        assert_eq!(in_flight_value(&handle.render()), Some(0.0));
    }

    #[test]
    fn test_parse_error_message() {
        let err: TaskError = serde_json::from_str::<MetadataFields>("{\"title\": 1}")
            .unwrap_err()
            .into();
        assert!(err.to_string().starts_with("Invalid metadata JSON"));
    }
}
