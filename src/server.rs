use crate::config::Config;
use crate::controller::SessionController;
use crate::error::OcrError;
use crate::session::SessionSnapshot;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub controller: Arc<SessionController>,
}

/// Recognition request body
#[derive(Deserialize)]
pub struct RecognizeRequest {
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub confirm: bool,
}

/// Recognition response
#[derive(Serialize)]
pub struct RecognizeResponse {
    pub text: String,
}

/// Acknowledgment for copy/save actions
#[derive(Serialize)]
pub struct AckResponse {
    pub message: String,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Server info response
#[derive(Serialize)]
pub struct InfoResponse {
    pub version: String,
    pub engine: Option<String>,
    pub engine_description: String,
    pub default_language: String,
    pub lang_path: String,
    pub storage_dir: String,
    pub max_file_size_bytes: usize,
}

const DOWNLOAD_FILE_NAME: &str = "ocr-output.txt";

/// Run the HTTP server
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let max_file_size = config.max_file_size;

    let state = AppState {
        controller: Arc::new(SessionController::new(config)),
    };

    let app = Router::new()
        .route("/file", post(handle_select_file))
        .route("/preview", get(handle_preview))
        .route("/clear", post(handle_clear))
        .route("/recognize", post(handle_recognize))
        .route("/state", get(handle_state))
        .route("/result/copy", post(handle_copy))
        .route("/result/download", get(handle_download))
        .route("/result/save", post(handle_save))
        .route("/health", get(handle_health))
        .route("/info", get(handle_info))
        // headroom over the upload limit: the size check with its 413
        // body runs in the controller, not in the transport
        .layer(DefaultBodyLimit::max(max_file_size + 64 * 1024))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Accept a file from the picker or drag-and-drop as a multipart upload
async fn handle_select_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, OcrError> {
    let mut file: Option<(String, String, Bytes)> = None;

    // Parse multipart form
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| OcrError::InvalidRequest(format!("Failed to parse multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();

        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| {
                    OcrError::InvalidRequest(format!("Failed to read file data: {}", e))
                })?;
                file = Some((file_name, media_type, bytes));
            }
            _ => {
                // Ignore unknown fields
            }
        }
    }

    let (name, media_type, bytes) = file.ok_or(OcrError::MissingFile)?;
    let snapshot = state.controller.select_file(&name, &media_type, &bytes)?;
    Ok(Json(snapshot))
}

/// Serve the stored image back for the preview box
async fn handle_preview(State(state): State<AppState>) -> Result<Response, OcrError> {
    let (media_type, bytes) = state.controller.preview()?;
    Ok(([(header::CONTENT_TYPE, media_type)], bytes).into_response())
}

/// Drop the selected file and result
async fn handle_clear(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.clear())
}

/// Run OCR over the selected file
async fn handle_recognize(
    State(state): State<AppState>,
    Json(request): Json<RecognizeRequest>,
) -> Result<Json<RecognizeResponse>, OcrError> {
    let text = state
        .controller
        .clone()
        .start_recognition(request.languages, request.confirm)
        .await?;
    Ok(Json(RecognizeResponse { text }))
}

/// Current session snapshot, polled for live progress
async fn handle_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.controller.snapshot())
}

/// Put the result text on the system clipboard
async fn handle_copy(State(state): State<AppState>) -> Result<Json<AckResponse>, OcrError> {
    let message = state.controller.copy_result()?;
    Ok(Json(AckResponse {
        message: message.to_string(),
    }))
}

/// Download the result text as a plain-text attachment
async fn handle_download(State(state): State<AppState>) -> impl IntoResponse {
    let text = state.controller.result_text();
    (
        [
            (
                header::CONTENT_TYPE,
                "text/plain; charset=utf-8".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
            ),
        ],
        text,
    )
}

/// Persist the result text locally
async fn handle_save(State(state): State<AppState>) -> Result<Json<AckResponse>, OcrError> {
    let message = state.controller.save_result()?;
    Ok(Json(AckResponse {
        message: message.to_string(),
    }))
}

/// Handle health check requests
async fn handle_health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle info requests
async fn handle_info(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.controller.config();
    let (engine, engine_description) = match state.controller.engine_status() {
        Ok(engine) => (Some(engine.name().to_string()), engine.description()),
        Err(reason) => (None, reason.to_string()),
    };

    Json(InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine,
        engine_description,
        default_language: config.default_language.clone(),
        lang_path: config.lang_path.clone(),
        storage_dir: state.controller.storage_dir().display().to_string(),
        max_file_size_bytes: config.max_file_size,
    })
}
