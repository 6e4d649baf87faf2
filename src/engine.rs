use crate::error::OcrError;
use crate::progress::ProgressSink;
use std::path::Path;

/// A recognition capability of the external Tesseract installation.
///
/// Exactly one implementation is selected when the server starts, based on
/// which invocation style the environment exposes: a spawnable `tesseract`
/// process (worker variant) or a remote OCR endpoint (direct variant).
/// Implementations block; callers run them off the async runtime.
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "worker", "direct")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> String;

    /// Extract text from an image file, reporting `{status, progress?}`
    /// events through the sink as the engine moves through its phases.
    fn recognize(
        &self,
        image: &Path,
        lang_spec: &str,
        progress: &ProgressSink<'_>,
    ) -> Result<String, OcrError>;
}
