//! Local OCR backend for the OCR.ai image-to-text page.
//!
//! One HTTP endpoint per page action: file selection, preview, clearing,
//! recognition with live progress, and result export (clipboard, download,
//! local save). Recognition is delegated to an external tesseract
//! capability probed once at startup.

pub mod clipboard;
pub mod config;
pub mod controller;
pub mod engine;
pub mod engines;
pub mod error;
pub mod progress;
pub mod server;
pub mod session;
pub mod store;
