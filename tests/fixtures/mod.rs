//! Work item fixtures for integration tests

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use stock_metadata_gen::models::item::{ContentKind, Payload, WorkItem};

/// Payload text for the named fixture. Scripted clients key on this.
pub fn payload_of(name: &str) -> String {
    format!("payload:{}", name)
}

/// In-memory image items, one per name, in order.
pub fn image_items(names: &[&str]) -> Vec<WorkItem> {
    names
        .iter()
        .enumerate()
        .map(|(index, name)| {
            WorkItem::new(
                index,
                format!("{}.jpg", name),
                "image/jpeg",
                ContentKind::Image,
                Payload::Inline(Arc::from(payload_of(name).into_bytes())),
            )
        })
        .collect()
}

/// An item whose file does not exist on disk.
pub fn missing_file_item(index: usize) -> WorkItem {
    WorkItem::new(
        index,
        "ghost.png",
        "image/png",
        ContentKind::Image,
        Payload::File(PathBuf::from("/nonexistent/dir/ghost.png")),
    )
}

/// Id the store assigns to the `index`-th fixture named `name`.
pub fn id_of(name: &str, index: usize) -> String {
    format!("{}.jpg-{}", name, index)
}
