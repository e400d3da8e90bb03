use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::models::item::{ItemState, ItemStatus};
use crate::models::settings::GenerationSettings;
use crate::services::credentials::CredentialPool;
use crate::services::runner::{run_item, truncate_diagnostic, RoundContext};
use crate::services::state_store::{BatchSummary, ItemStateStore};

/// Outcome of one dispatch round, read from the store after every task joined.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchReport {
    pub launched: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub summary: BatchSummary,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.summary.all_succeeded()
    }
}

/// Fans eligible items out to concurrent runners and waits for all of them.
///
/// Callers must not start a second round on the same store before the first
/// returns.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    max_concurrency: Option<usize>,
}

impl Dispatcher {
    /// Unbounded fan-out: every eligible item starts at once.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap how many items run at the same time. Items waiting for a slot stay
    /// `pending` until they start. `Some(0)` is treated as unbounded.
    pub fn with_max_concurrency(max_concurrency: Option<usize>) -> Self {
        Self {
            max_concurrency: max_concurrency.filter(|&n| n > 0),
        }
    }

    pub async fn dispatch(
        &self,
        store: Arc<ItemStateStore>,
        pool: Arc<CredentialPool>,
        settings: &GenerationSettings,
    ) -> Result<DispatchReport, DispatchError> {
        let eligible = store.eligible().await;
        if eligible.is_empty() {
            return Err(DispatchError::NothingToProcess);
        }
        if pool.is_empty() {
            return Err(DispatchError::NoCredentials);
        }

        info!(
            items = eligible.len(),
            credentials = pool.len(),
            max_concurrency = ?self.max_concurrency,
            "Starting dispatch round"
        );

        let ctx = Arc::new(RoundContext::new(Arc::clone(&store), pool, settings));
        let limiter = self.max_concurrency.map(|n| Arc::new(Semaphore::new(n)));

        let tasks: Vec<_> = eligible
            .into_iter()
            .map(|item| {
                let ctx = Arc::clone(&ctx);
                let limiter = limiter.clone();
                let id = item.id.clone();
                let handle = tokio::spawn(async move {
                    let _permit = match limiter {
                        Some(semaphore) => semaphore.acquire_owned().await.ok(),
                        None => None,
                    };
                    run_item(&item, &ctx).await
                });
                (id, handle)
            })
            .collect();

        let launched = tasks.len();
        let (ids, handles): (Vec<_>, Vec<_>) = tasks.into_iter().unzip();
        let results = join_all(handles).await;

        let mut succeeded = 0;
        let mut failed = 0;
        for (id, result) in ids.iter().zip(results) {
            match result {
                Ok(ItemStatus::Success) => succeeded += 1,
                Ok(_) => failed += 1,
                Err(e) => {
                    // A runner that died mid-flight must not leave its item `processing`.
                    error!(item_id = %id, error = %e, "Item task aborted");
                    let message = truncate_diagnostic(&format!("Task aborted: {}", e));
                    if let Err(e) = store.transition(id, ItemState::Failed(message)).await {
                        error!(item_id = %id, error = %e, "Failed to record aborted item");
                    }
                    failed += 1;
                }
            }
        }

        let summary = store.summary().await;
        info!(
            launched,
            succeeded,
            failed,
            total_succeeded = summary.succeeded,
            total = summary.total,
            "Dispatch round complete"
        );

        Ok(DispatchReport {
            launched,
            succeeded,
            failed,
            summary,
        })
    }
}

/// Configuration problems caught before any item is touched.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("All files have been processed.")]
    NothingToProcess,

    #[error("Please provide at least one Google AI Studio API Key.")]
    NoCredentials,
}
