//! Session state: the one mutable record behind the page.
//!
//! A session holds the currently selected image, the progress label, the
//! result text, and the busy flag. `reset` returns it to exactly the
//! values it was constructed with; selection and clearing both go through
//! it.

use crate::error::OcrError;
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;

/// An uploaded image held for the lifetime of the selection.
///
/// The bytes live in a named temp file whose suffix is derived from the
/// declared media type. The file is deleted when the last reference goes
/// away, so an in-flight recognition holding an `Arc` keeps its input
/// alive across clear and re-select.
pub struct StoredFile {
    file: NamedTempFile,
    pub name: String,
    pub media_type: String,
    pub size: usize,
    pub dimensions: Option<(u32, u32)>,
}

impl StoredFile {
    pub fn create(name: &str, media_type: &str, bytes: &[u8]) -> Result<Self, OcrError> {
        let mut file = tempfile::Builder::new()
            .suffix(extension_for(media_type))
            .tempfile()
            .map_err(|e| OcrError::Internal(format!("Failed to create temp file: {}", e)))?;

        file.write_all(bytes)
            .map_err(|e| OcrError::Internal(format!("Failed to write temp file: {}", e)))?;

        // Best effort: the preview box wants pixel dimensions, recognition
        // does not.
        let dimensions = image::image_dimensions(file.path()).ok();

        Ok(Self {
            file,
            name: name.to_string(),
            media_type: media_type.to_string(),
            size: bytes.len(),
            dimensions,
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}

/// Determine temp file suffix from mime type
fn extension_for(media_type: &str) -> &'static str {
    match media_type {
        "image/png" => ".png",
        "image/jpeg" => ".jpg",
        "image/gif" => ".gif",
        "image/bmp" => ".bmp",
        "image/webp" => ".webp",
        "image/tiff" => ".tiff",
        _ => ".tmp",
    }
}

/// Mutable state of the single session.
pub struct SessionState {
    pub selected_file: Option<Arc<StoredFile>>,
    pub progress_label: String,
    pub result_text: String,
    pub busy: bool,
}

impl SessionState {
    /// Defined initial values: no file, `idle` label, empty result, not busy.
    pub fn new() -> Self {
        Self {
            selected_file: None,
            progress_label: "idle".to_string(),
            result_text: String::new(),
            busy: false,
        }
    }

    /// Return the session to exactly its initial values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable view of the session for `GET /state` polling.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub file: Option<FileInfo>,
    pub preview_url: Option<String>,
    pub progress_label: String,
    pub result_text: String,
    pub busy: bool,
    pub engine: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub media_type: String,
    pub size: usize,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl FileInfo {
    pub fn of(file: &StoredFile) -> Self {
        Self {
            name: file.name.clone(),
            media_type: file.media_type.clone(),
            size: file.size,
            width: file.dimensions.map(|(w, _)| w),
            height: file.dimensions.map(|(_, h)| h),
        }
    }
}
