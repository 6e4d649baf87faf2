//! Direct engine: one HTTP call per recognition to a remote OCR endpoint.
//!
//! The primary call posts the raw image bytes. Endpoints in the wild
//! disagree on the request shape, so a failed primary call is retried
//! once with a base64 JSON payload before giving up. Responses are
//! normalized from the common `{data: {text}}` / `{text}` shapes down to
//! the raw body.

use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::progress::{ProgressEvent, ProgressSink, RECOGNIZING_TEXT};
use base64::Engine as _;
use std::path::Path;

pub struct DirectEngine {
    endpoint: String,
}

impl DirectEngine {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint }
    }

    /// Primary request shape: raw image bytes, language spec in the query.
    fn call_primary(&self, bytes: &[u8], lang_spec: &str, content_type: &str) -> Result<String, String> {
        let response = ureq::post(self.endpoint.as_str())
            .query("languages", lang_spec)
            .header("Content-Type", content_type)
            .send(bytes)
            .map_err(|e| e.to_string())?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| e.to_string())
    }

    /// Alternate request shape: JSON with base64 image, for endpoints that
    /// reject raw bodies.
    fn call_alternate(&self, bytes: &[u8], lang_spec: &str) -> Result<String, String> {
        let payload = serde_json::json!({
            "image": base64::engine::general_purpose::STANDARD.encode(bytes),
            "lang": lang_spec,
        });
        let response = ureq::post(self.endpoint.as_str())
            .send_json(payload)
            .map_err(|e| e.to_string())?;
        response
            .into_body()
            .read_to_string()
            .map_err(|e| e.to_string())
    }
}

impl OcrEngine for DirectEngine {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn description(&self) -> String {
        format!("remote OCR endpoint at {}", self.endpoint)
    }

    fn recognize(
        &self,
        image: &Path,
        lang_spec: &str,
        progress: &ProgressSink<'_>,
    ) -> Result<String, OcrError> {
        let bytes = std::fs::read(image).map_err(|e| {
            OcrError::engine_failure("direct call", format!("could not read image: {}", e))
        })?;
        let content_type = content_type_for(image);

        progress(ProgressEvent::fraction(RECOGNIZING_TEXT, 0.0));

        let body = match self.call_primary(&bytes, lang_spec, content_type) {
            Ok(body) => body,
            Err(primary_err) => {
                tracing::warn!(
                    "Primary OCR call failed ({}), retrying with alternate signature",
                    primary_err
                );
                self.call_alternate(&bytes, lang_spec).map_err(|alternate_err| {
                    OcrError::engine_failure(
                        "direct call",
                        format!(
                            "primary call failed: {}; alternate signature failed: {}",
                            primary_err, alternate_err
                        ),
                    )
                })?
            }
        };

        progress(ProgressEvent::fraction(RECOGNIZING_TEXT, 1.0));
        Ok(extract_text(&body).trim().to_string())
    }
}

/// Pull recognized text out of whatever shape the endpoint answered with:
/// `{data: {text}}`, then `{text}`, then a bare JSON string, then the raw
/// body itself.
fn extract_text(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(text) = value.pointer("/data/text").and_then(|v| v.as_str()) {
            return text.to_string();
        }
        if let Some(text) = value.get("text").and_then(|v| v.as_str()) {
            return text.to_string();
        }
        if let Some(text) = value.as_str() {
            return text.to_string();
        }
    }
    body.to_string()
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("tif") | Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}
