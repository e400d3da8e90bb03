use std::collections::HashMap;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;

use crate::models::item::{ItemRecord, ItemState, ItemStatus, WorkItem};

/// Per-status counts over a whole batch.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct BatchSummary {
    pub total: usize,
    pub pending: usize,
    pub processing: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Every item succeeded. An empty batch is never complete.
    pub fn all_succeeded(&self) -> bool {
        self.total > 0 && self.succeeded == self.total
    }

    /// Items a new round would pick up.
    pub fn remaining(&self) -> usize {
        self.pending + self.failed
    }

    pub fn progress_percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 / self.total as f64 * 100.0
    }
}

struct Entries {
    records: Vec<ItemRecord>,
    index: HashMap<String, usize>,
}

/// Keyed lifecycle state for every item in one batch run.
///
/// The item set is fixed at construction; only states change. One coarse lock
/// guards the whole table, which is enough given writes are bounded by twice
/// the item count per round.
pub struct ItemStateStore {
    entries: RwLock<Entries>,
}

impl ItemStateStore {
    /// Build a store with every item `pending`. Ids must be unique.
    pub fn new(items: Vec<WorkItem>) -> Result<Self, StoreError> {
        let mut index = HashMap::with_capacity(items.len());
        let now = Utc::now();
        let mut records = Vec::with_capacity(items.len());

        for (position, item) in items.into_iter().enumerate() {
            if index.insert(item.id.clone(), position).is_some() {
                return Err(StoreError::DuplicateItem(item.id));
            }
            records.push(ItemRecord {
                item,
                state: ItemState::Pending,
                updated_at: now,
            });
        }

        Ok(Self {
            entries: RwLock::new(Entries { records, index }),
        })
    }

    pub fn empty() -> Self {
        Self {
            entries: RwLock::new(Entries {
                records: Vec::new(),
                index: HashMap::new(),
            }),
        }
    }

    /// Snapshot of every record in upload order.
    pub async fn list(&self) -> Vec<ItemRecord> {
        self.entries.read().await.records.clone()
    }

    pub async fn get(&self, id: &str) -> Option<ItemRecord> {
        let entries = self.entries.read().await;
        entries.index.get(id).map(|&i| entries.records[i].clone())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.records.len()
    }

    /// Replace the state of `id` wholesale.
    pub async fn transition(&self, id: &str, next: ItemState) -> Result<(), StoreError> {
        let mut entries = self.entries.write().await;
        let position = *entries
            .index
            .get(id)
            .ok_or_else(|| StoreError::UnknownItem(id.to_string()))?;

        let record = &mut entries.records[position];
        let from = record.state.status();
        let to = next.status();
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                id: id.to_string(),
                from,
                to,
            });
        }

        record.state = next;
        record.updated_at = Utc::now();
        Ok(())
    }

    /// Items a dispatch round should process: `pending` or `failed`.
    pub async fn eligible(&self) -> Vec<WorkItem> {
        self.entries
            .read()
            .await
            .records
            .iter()
            .filter(|r| r.state.status().is_eligible())
            .map(|r| r.item.clone())
            .collect()
    }

    pub async fn summary(&self) -> BatchSummary {
        let entries = self.entries.read().await;
        let mut summary = BatchSummary {
            total: entries.records.len(),
            ..BatchSummary::default()
        };
        for record in &entries.records {
            match record.state.status() {
                ItemStatus::Pending => summary.pending += 1,
                ItemStatus::Processing => summary.processing += 1,
                ItemStatus::Success => summary.succeeded += 1,
                ItemStatus::Failed => summary.failed += 1,
            }
        }
        summary
    }

    pub async fn is_complete(&self) -> bool {
        self.summary().await.all_succeeded()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Unknown item: {0}")]
    UnknownItem(String),

    #[error("Duplicate item id: {0}")]
    DuplicateItem(String),

    #[error("Item {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ItemStatus,
        to: ItemStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::item::{ContentKind, Payload};
    use crate::models::metadata::GeneratedMetadata;
    use std::sync::Arc;

    fn items(n: usize) -> Vec<WorkItem> {
        (0..n)
            .map(|i| {
                WorkItem::new(
                    i,
                    format!("file{}.png", i),
                    "image/png",
                    ContentKind::Image,
                    Payload::Inline(Arc::from(&b"png"[..])),
                )
            })
            .collect()
    }

    fn metadata(file_name: &str) -> GeneratedMetadata {
        GeneratedMetadata {
            file_name: file_name.to_string(),
            title: "Title".to_string(),
            keywords: vec!["one".to_string()],
            category: "Animals".to_string(),
        }
    }

    #[tokio::test]
    async fn test_new_store_is_all_pending() {
        let store = ItemStateStore::new(items(3)).unwrap();
        let summary = store.summary().await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pending, 3);
        assert_eq!(store.eligible().await.len(), 3);
        assert!(!store.is_complete().await);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected() {
        let mut list = items(1);
        list.push(list[0].clone());
        assert!(matches!(
            ItemStateStore::new(list),
            Err(StoreError::DuplicateItem(_))
        ));
    }

    #[tokio::test]
    async fn test_list_preserves_upload_order() {
        let store = ItemStateStore::new(items(4)).unwrap();
        store.transition("file2.png-2", ItemState::Processing).await.unwrap();
        let ids: Vec<_> = store.list().await.into_iter().map(|r| r.item.id).collect();
        assert_eq!(ids, vec!["file0.png-0", "file1.png-1", "file2.png-2", "file3.png-3"]);
    }

    #[tokio::test]
    async fn test_transition_replaces_state_wholesale() {
        let store = ItemStateStore::new(items(1)).unwrap();
        let id = "file0.png-0";

        store.transition(id, ItemState::Failed("boom".into())).await.unwrap();
        store.transition(id, ItemState::Processing).await.unwrap();
        let record = store.get(id).await.unwrap();
        assert_eq!(record.state, ItemState::Processing);
        assert!(record.state.error().is_none());

        store.transition(id, ItemState::Success(metadata("file0.png"))).await.unwrap();
        assert!(store.is_complete().await);
        assert!(store.eligible().await.is_empty());
    }

    #[tokio::test]
    async fn test_success_cannot_be_overwritten() {
        let store = ItemStateStore::new(items(1)).unwrap();
        let id = "file0.png-0";
        store.transition(id, ItemState::Processing).await.unwrap();
        store.transition(id, ItemState::Success(metadata("file0.png"))).await.unwrap();

        let err = store.transition(id, ItemState::Processing).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        let err = store.transition(id, ItemState::Failed("late".into())).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert_eq!(store.get(id).await.unwrap().state.status(), ItemStatus::Success);
    }

    #[tokio::test]
    async fn test_unknown_item() {
        let store = ItemStateStore::new(items(1)).unwrap();
        let err = store.transition("nope", ItemState::Processing).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownItem(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_to_different_items() {
        let store = Arc::new(ItemStateStore::new(items(32)).unwrap());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let id = format!("file{}.png-{}", i, i);
                    store.transition(&id, ItemState::Processing).await.unwrap();
                    let next = if i % 2 == 0 {
                        ItemState::Success(metadata(&format!("file{}.png", i)))
                    } else {
                        ItemState::Failed(format!("error {}", i))
                    };
                    store.transition(&id, next).await.unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        let summary = store.summary().await;
        assert_eq!(summary.succeeded, 16);
        assert_eq!(summary.failed, 16);
        for (i, record) in store.list().await.iter().enumerate() {
            if i % 2 == 0 {
                assert_eq!(record.state.metadata().unwrap().file_name, format!("file{}.png", i));
            } else {
                assert_eq!(record.state.error(), Some(format!("error {}", i).as_str()));
            }
        }
    }

    #[test]
    fn test_summary_progress() {
        let summary = BatchSummary {
            total: 4,
            succeeded: 1,
            failed: 1,
            pending: 2,
            processing: 0,
        };
        assert_eq!(summary.progress_percent(), 25.0);
        assert_eq!(summary.remaining(), 3);
        assert!(!summary.all_succeeded());
        assert_eq!(BatchSummary::default().progress_percent(), 0.0);
        assert!(!BatchSummary::default().all_succeeded());
    }
}
