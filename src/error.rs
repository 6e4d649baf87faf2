use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Unsupported file type: {0}. Please upload an image (JPG, PNG).")]
    UnsupportedFileType(String),

    #[error("{0}")]
    EngineUnavailable(String),

    #[error("OCR failed ({path}): {message}")]
    EngineInvocationFailure { path: String, message: String },

    #[error("Copy failed: {0}")]
    ClipboardFailure(String),

    #[error("Save failed: {0}")]
    StorageFailure(String),

    #[error("{count} languages selected. This will download multiple traineddata files and may be slow. Confirm to continue.")]
    ConfirmationRequired { count: usize },

    #[error("A recognition request is already in progress")]
    Busy,

    #[error("Missing file in request")]
    MissingFile,

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OcrError {
    /// Wrap an engine failure with the call path that produced it.
    pub fn engine_failure(path: &str, message: impl Into<String>) -> Self {
        OcrError::EngineInvocationFailure {
            path: path.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl IntoResponse for OcrError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            OcrError::UnsupportedFileType(_) => {
                (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FILE_TYPE")
            }
            OcrError::EngineUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "ENGINE_UNAVAILABLE")
            }
            OcrError::EngineInvocationFailure { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "ENGINE_FAILURE")
            }
            OcrError::ClipboardFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CLIPBOARD_ERROR"),
            OcrError::StorageFailure(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            OcrError::ConfirmationRequired { .. } => (StatusCode::CONFLICT, "CONFIRMATION_REQUIRED"),
            OcrError::Busy => (StatusCode::CONFLICT, "BUSY"),
            OcrError::MissingFile => (StatusCode::BAD_REQUEST, "MISSING_FILE"),
            OcrError::FileTooLarge { .. } => (StatusCode::PAYLOAD_TOO_LARGE, "FILE_TOO_LARGE"),
            OcrError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            OcrError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        });

        (status, body).into_response()
    }
}
