use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::models::metadata::GeneratedMetadata;

/// Broad kind of media a work item carries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, EnumString, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ContentKind {
    Image,
    Video,
}

impl ContentKind {
    /// Classify a mime type such as `image/png` or `video/mp4`.
    pub fn from_mime(mime_type: &str) -> Option<Self> {
        let top = mime_type.split('/').next()?.trim().to_ascii_lowercase();
        match top.as_str() {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Where an item's bytes live.
#[derive(Clone)]
pub enum Payload {
    /// Bytes already held in memory (multipart uploads).
    Inline(Arc<[u8]>),
    /// A file on local disk, read lazily when the item is processed.
    File(PathBuf),
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inline(bytes) => write!(f, "Inline({} bytes)", bytes.len()),
            Self::File(path) => write!(f, "File({})", path.display()),
        }
    }
}

impl Payload {
    pub async fn read(&self) -> std::io::Result<Arc<[u8]>> {
        match self {
            Self::Inline(bytes) => Ok(Arc::clone(bytes)),
            Self::File(path) => Ok(tokio::fs::read(path).await?.into()),
        }
    }
}

/// One uploaded file awaiting metadata generation. Immutable once built.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub id: String,
    pub file_name: String,
    pub mime_type: String,
    pub kind: ContentKind,
    pub payload: Payload,
}

impl WorkItem {
    /// Build an item whose id is derived from its file name and batch position,
    /// so two uploads of the same file name stay distinct.
    pub fn new(
        index: usize,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        kind: ContentKind,
        payload: Payload,
    ) -> Self {
        let file_name = file_name.into();
        Self {
            id: format!("{}-{}", file_name, index),
            file_name,
            mime_type: mime_type.into(),
            kind,
            payload,
        }
    }
}

/// Lifecycle status of a work item.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Display, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ItemStatus {
    Pending,
    Processing,
    Success,
    Failed,
}

impl ItemStatus {
    /// Whether a dispatch round should pick this item up.
    pub fn is_eligible(self) -> bool {
        matches!(self, Self::Pending | Self::Failed)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }

    /// `success` is final; `processing` is only entered from an eligible state
    /// and a terminal state is only entered from `processing`, except that a
    /// runner with no credential fails an eligible item directly.
    pub fn can_transition_to(self, next: ItemStatus) -> bool {
        match (self, next) {
            (Self::Success, _) => false,
            (Self::Pending | Self::Failed, Self::Processing) => true,
            (Self::Pending | Self::Failed, Self::Failed) => true,
            (Self::Processing, Self::Success | Self::Failed) => true,
            _ => false,
        }
    }
}

/// Status plus its payload. Result and error can never be set independently
/// of the status they belong to.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemState {
    Pending,
    Processing,
    Success(GeneratedMetadata),
    Failed(String),
}

impl ItemState {
    pub fn status(&self) -> ItemStatus {
        match self {
            Self::Pending => ItemStatus::Pending,
            Self::Processing => ItemStatus::Processing,
            Self::Success(_) => ItemStatus::Success,
            Self::Failed(_) => ItemStatus::Failed,
        }
    }

    pub fn metadata(&self) -> Option<&GeneratedMetadata> {
        match self {
            Self::Success(metadata) => Some(metadata),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed(message) => Some(message),
            _ => None,
        }
    }
}

/// A store entry: the immutable item and its current state.
#[derive(Debug, Clone)]
pub struct ItemRecord {
    pub item: WorkItem,
    pub state: ItemState,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_kind_from_mime() {
        assert_eq!(ContentKind::from_mime("image/png"), Some(ContentKind::Image));
        assert_eq!(ContentKind::from_mime("VIDEO/mp4"), Some(ContentKind::Video));
        assert_eq!(ContentKind::from_mime("application/pdf"), None);
        assert_eq!(ContentKind::from_mime(""), None);
    }

    #[test]
    fn test_item_id_includes_index() {
        let payload = Payload::Inline(Arc::from(&b"x"[..]));
        let a = WorkItem::new(0, "cat.jpg", "image/jpeg", ContentKind::Image, payload.clone());
        let b = WorkItem::new(1, "cat.jpg", "image/jpeg", ContentKind::Image, payload);
        assert_eq!(a.id, "cat.jpg-0");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_success_is_final() {
        for next in [
            ItemStatus::Pending,
            ItemStatus::Processing,
            ItemStatus::Success,
            ItemStatus::Failed,
        ] {
            assert!(!ItemStatus::Success.can_transition_to(next));
        }
    }

    #[test]
    fn test_failed_is_retryable() {
        assert!(ItemStatus::Failed.is_eligible());
        assert!(ItemStatus::Failed.can_transition_to(ItemStatus::Processing));
        assert!(!ItemStatus::Pending.can_transition_to(ItemStatus::Success));
        assert!(!ItemStatus::Processing.is_eligible());
    }

    #[tokio::test]
    async fn test_file_payload_read_error() {
        let payload = Payload::File(PathBuf::from("/definitely/not/here.png"));
        assert!(payload.read().await.is_err());
    }
}
