use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::item::WorkItem;
use crate::services::state_store::{ItemStateStore, StoreError};

/// One upload: its items and their states. Replacing the upload means
/// building a new run, which starts every item over at `pending`.
#[derive(Clone)]
pub struct BatchRun {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub store: Arc<ItemStateStore>,
}

impl BatchRun {
    pub fn new(items: Vec<WorkItem>) -> Result<Self, StoreError> {
        Ok(Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            store: Arc::new(ItemStateStore::new(items)?),
        })
    }

    pub fn empty() -> Self {
        Self {
            id: Uuid::nil(),
            created_at: Utc::now(),
            store: Arc::new(ItemStateStore::empty()),
        }
    }
}
