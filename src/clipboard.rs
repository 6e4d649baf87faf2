//! System clipboard behind a small trait so the session controller can be
//! exercised without a display server.

use crate::error::OcrError;

pub trait Clipboard: Send + Sync {
    fn write_text(&self, text: &str) -> Result<(), OcrError>;
}

/// The real clipboard. A fresh handle per write; `arboard` contexts are
/// cheap and holding one across requests pins platform resources.
#[derive(Default)]
pub struct SystemClipboard;

impl Clipboard for SystemClipboard {
    fn write_text(&self, text: &str) -> Result<(), OcrError> {
        let mut clipboard = arboard::Clipboard::new()
            .map_err(|e| OcrError::ClipboardFailure(e.to_string()))?;
        clipboard
            .set_text(text)
            .map_err(|e| OcrError::ClipboardFailure(e.to_string()))
    }
}
