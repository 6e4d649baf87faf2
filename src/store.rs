//! Durable storage for the last saved result.
//!
//! One fixed key, one raw string value, written only on explicit save.

use crate::error::OcrError;
use std::fs;
use std::path::{Path, PathBuf};

/// Storage key for the last saved result text.
pub const LAST_TEXT_KEY: &str = "ocrai_last_text";

pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn key_path(&self) -> PathBuf {
        self.dir.join(LAST_TEXT_KEY)
    }

    /// Persist the result text under the fixed key.
    pub fn save(&self, text: &str) -> Result<(), OcrError> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            OcrError::StorageFailure(format!(
                "could not create {}: {}",
                self.dir.display(),
                e
            ))
        })?;
        fs::write(self.key_path(), text)
            .map_err(|e| OcrError::StorageFailure(e.to_string()))
    }

    /// Read back the last saved result, `None` if never saved.
    pub fn load_last(&self) -> Result<Option<String>, OcrError> {
        let path = self.key_path();
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .map_err(|e| OcrError::StorageFailure(e.to_string()))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
