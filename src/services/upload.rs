use std::path::Path;
use std::sync::Arc;

use crate::models::item::{ContentKind, Payload, WorkItem};

/// Work out mime type and kind for an uploaded file.
///
/// Images are identified by their bytes; a declared `image/*` type that the
/// decoder does not recognise is rejected. Videos are taken on their declared
/// type.
pub fn classify(bytes: &[u8], declared: Option<&str>) -> Result<(String, ContentKind), UploadError> {
    if let Ok(format) = image::guess_format(bytes) {
        return Ok((format.to_mime_type().to_string(), ContentKind::Image));
    }

    match declared.and_then(|mime| ContentKind::from_mime(mime).map(|kind| (mime, kind))) {
        Some((mime, ContentKind::Video)) => Ok((mime.to_string(), ContentKind::Video)),
        _ => Err(UploadError::UnsupportedMedia(
            declared.unwrap_or("unknown").to_string(),
        )),
    }
}

/// Build a work item from bytes received over the wire.
pub fn item_from_upload(
    index: usize,
    file_name: &str,
    declared: Option<&str>,
    bytes: Vec<u8>,
) -> Result<WorkItem, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty(file_name.to_string()));
    }
    let (mime_type, kind) = classify(&bytes, declared)?;
    Ok(WorkItem::new(
        index,
        file_name,
        mime_type,
        kind,
        Payload::Inline(Arc::from(bytes)),
    ))
}

const VIDEO_EXTENSIONS: &[(&str, &str)] = &[
    ("mp4", "video/mp4"),
    ("m4v", "video/x-m4v"),
    ("mov", "video/quicktime"),
    ("webm", "video/webm"),
    ("avi", "video/x-msvideo"),
    ("mkv", "video/x-matroska"),
];

/// Build a work item that reads `path` lazily when processed.
pub fn item_from_path(index: usize, path: &Path) -> Result<WorkItem, UploadError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let (mime_type, kind) = if let Ok(format) = image::ImageFormat::from_path(path) {
        (format.to_mime_type().to_string(), ContentKind::Image)
    } else {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let mime = VIDEO_EXTENSIONS
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, mime)| *mime)
            .ok_or_else(|| UploadError::UnsupportedMedia(file_name.clone()))?;
        (mime.to_string(), ContentKind::Video)
    };

    Ok(WorkItem::new(
        index,
        file_name,
        mime_type,
        kind,
        Payload::File(path.to_path_buf()),
    ))
}

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Unsupported media type: {0}")]
    UnsupportedMedia(String),

    #[error("Empty file: {0}")]
    Empty(String),

    #[error("No files in upload")]
    NoFiles,

    #[error("Malformed upload: {0}")]
    Malformed(String),
}
