use std::path::Path;

use tokio::io::AsyncWriteExt;

use crate::models::metadata::GeneratedMetadata;
use crate::services::state_store::ItemStateStore;

pub const EXPORT_FILE_NAME: &str = "adobe_stock_metadata.csv";

const HEADERS: [&str; 4] = ["File Name", "Title", "Keywords", "Category"];

/// Always quote, doubling embedded quotes.
fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}

fn metadata_to_csv_line(metadata: &GeneratedMetadata) -> String {
    [
        quote(&metadata.file_name),
        quote(&metadata.title),
        quote(&metadata.keywords.join(";")),
        quote(&metadata.category),
    ]
    .join(",")
}

/// Render rows for the given metadata, header first, newline separated.
pub fn render_csv(rows: &[GeneratedMetadata]) -> String {
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(HEADERS.join(","));
    lines.extend(rows.iter().map(metadata_to_csv_line));
    lines.join("\n")
}

/// Export the batch, refusing unless every item succeeded.
pub async fn export_csv(store: &ItemStateStore) -> Result<String, ExportError> {
    let summary = store.summary().await;
    if !summary.all_succeeded() {
        return Err(ExportError::Incomplete {
            succeeded: summary.succeeded,
            total: summary.total,
        });
    }

    let rows: Vec<GeneratedMetadata> = store
        .list()
        .await
        .into_iter()
        .filter_map(|record| record.state.metadata().cloned())
        .collect();

    Ok(render_csv(&rows))
}

pub async fn write_csv(store: &ItemStateStore, path: &Path) -> Result<usize, ExportError> {
    let csv = export_csv(store).await?;
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(csv.as_bytes()).await?;
    file.flush().await?;
    Ok(csv.len())
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export unavailable: {succeeded} of {total} items have metadata")]
    Incomplete { succeeded: usize, total: usize },

    #[error("Failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_quotes_every_field() {
        let rows = vec![GeneratedMetadata {
            file_name: "a \"b\".jpg".to_string(),
            title: "Sunset, beach".to_string(),
            keywords: vec!["sun".to_string(), "sea".to_string()],
            category: "Travel".to_string(),
        }];
        let csv = render_csv(&rows);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("File Name,Title,Keywords,Category"));
        assert_eq!(
            lines.next(),
            Some(r#""a ""b"".jpg","Sunset, beach","sun;sea","Travel""#)
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_render_empty_is_header_only() {
        assert_eq!(render_csv(&[]), "File Name,Title,Keywords,Category");
    }
}
