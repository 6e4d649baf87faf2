//! OCR engine variants
//!
//! This module contains the two invocation styles the server can drive:
//! a spawned tesseract worker process and a one-shot remote endpoint.
//! Which one is used is decided once at startup by capability probing.

pub mod direct;
pub mod worker;

use crate::config::Config;
use crate::engine::OcrEngine;
use crate::error::OcrError;
use std::sync::Arc;

/// Join selected language codes into the combined string the engine consumes.
///
/// Codes are joined with `+` (the form tesseract takes in `-l`); the
/// configured default stands in when nothing was selected.
pub fn join_language_spec(codes: &[String], default_language: &str) -> String {
    if codes.is_empty() {
        default_language.to_string()
    } else {
        codes.join("+")
    }
}

/// Select the recognition capability available in this environment.
///
/// The worker style (a spawnable tesseract binary) takes priority; a
/// configured remote OCR endpoint is the fallback. The choice is made
/// once here and reused for every request.
pub fn probe(config: &Config) -> Result<Arc<dyn OcrEngine>, OcrError> {
    match worker::WorkerEngine::probe(config) {
        Ok(engine) => {
            tracing::info!("Using worker engine: {}", engine.description());
            return Ok(Arc::new(engine));
        }
        Err(reason) => {
            tracing::warn!("Worker engine unavailable: {}", reason);
        }
    }

    if let Some(endpoint) = &config.ocr_endpoint {
        let engine = direct::DirectEngine::new(endpoint.clone());
        tracing::info!("Using direct engine: {}", engine.description());
        return Ok(Arc::new(engine));
    }

    Err(OcrError::EngineUnavailable(
        "Tesseract capability not found: no runnable tesseract binary on PATH and no remote OCR endpoint configured"
            .to_string(),
    ))
}
