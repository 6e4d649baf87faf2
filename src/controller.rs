//! Session controller: owns the single OCR session behind the HTTP API.
//!
//! All handler work funnels through here. State mutation happens under
//! one lock, recognition runs on a detached blocking task so the busy
//! flag clears even when the requesting client is gone, and progress
//! events are folded into the session label as they arrive.

use crate::clipboard::{Clipboard, SystemClipboard};
use crate::config::Config;
use crate::engine::OcrEngine;
use crate::engines;
use crate::error::OcrError;
use crate::progress::{format_progress, ProgressEvent};
use crate::session::{FileInfo, SessionSnapshot, SessionState, StoredFile};
use crate::store::LocalStore;
use parking_lot::Mutex;
use std::sync::Arc;

pub struct SessionController {
    config: Config,
    /// The probed capability, or the reason none is available. Probing
    /// happens once at startup; requests reuse the result.
    engine: Result<Arc<dyn OcrEngine>, String>,
    state: Mutex<SessionState>,
    store: LocalStore,
    clipboard: Box<dyn Clipboard>,
}

impl SessionController {
    pub fn new(config: Config) -> Self {
        let engine = engines::probe(&config).map_err(|e| e.to_string());
        let store = LocalStore::new(config.storage_dir());
        Self::with_parts(config, engine, store, Box::new(SystemClipboard::default()))
    }

    fn with_parts(
        config: Config,
        engine: Result<Arc<dyn OcrEngine>, String>,
        store: LocalStore,
        clipboard: Box<dyn Clipboard>,
    ) -> Self {
        let mut state = SessionState::new();
        match store.load_last() {
            Ok(Some(text)) => {
                tracing::info!("Restored previously saved result ({} chars)", text.len());
                state.result_text = text;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("Could not restore saved result: {}", e),
        }

        Self {
            config,
            engine,
            state: Mutex::new(state),
            store,
            clipboard,
        }
    }

    /// Accept a dropped/browsed file into the session.
    ///
    /// Only the declared media type is inspected; a rejection leaves the
    /// session exactly as it was. Accepting a file resets the whole
    /// session before installing it.
    pub fn select_file(
        &self,
        name: &str,
        media_type: &str,
        bytes: &[u8],
    ) -> Result<SessionSnapshot, OcrError> {
        if !media_type.starts_with("image/") {
            return Err(OcrError::UnsupportedFileType(media_type.to_string()));
        }
        if bytes.len() > self.config.max_file_size {
            return Err(OcrError::FileTooLarge {
                size: bytes.len(),
                max: self.config.max_file_size,
            });
        }

        let file = StoredFile::create(name, media_type, bytes)?;
        tracing::info!(
            "File selected: {} ({} bytes, {})",
            file.name,
            file.size,
            file.media_type
        );

        let mut state = self.state.lock();
        state.reset();
        state.selected_file = Some(Arc::new(file));
        state.progress_label = "ready".to_string();
        Ok(self.snapshot_locked(&state))
    }

    /// Drop the selected file and result, returning to the initial state.
    /// An in-flight recognition keeps its own file reference and finishes
    /// on its own.
    pub fn clear(&self) -> SessionSnapshot {
        let mut state = self.state.lock();
        state.reset();
        self.snapshot_locked(&state)
    }

    /// Run OCR over the selected file and return the recognized text.
    ///
    /// Selecting more than 3 languages asks for confirmation first, since
    /// each language may pull a traineddata download. The busy flag is
    /// checked and set under the lock, and cleared on every completion
    /// path, engine panic included.
    pub async fn start_recognition(
        self: Arc<Self>,
        languages: Vec<String>,
        confirm: bool,
    ) -> Result<String, OcrError> {
        let file = {
            let mut state = self.state.lock();
            let file = state.selected_file.clone().ok_or(OcrError::MissingFile)?;
            if languages.len() > 3 && !confirm {
                return Err(OcrError::ConfirmationRequired {
                    count: languages.len(),
                });
            }
            if state.busy {
                return Err(OcrError::Busy);
            }
            state.busy = true;
            state.progress_label = "starting".to_string();
            file
        };

        let engine = match &self.engine {
            Ok(engine) => Arc::clone(engine),
            Err(reason) => {
                return self.complete_recognition(Err(OcrError::EngineUnavailable(reason.clone())));
            }
        };

        let lang_spec = engines::join_language_spec(&languages, &self.config.default_language);
        tracing::info!(
            "Starting recognition with languages '{}' via {} engine",
            lang_spec,
            engine.name()
        );

        // Detached so completion bookkeeping happens even if the caller
        // disconnects and this future is dropped mid-await.
        let controller = self.clone();
        let task = tokio::spawn(async move {
            let progress_controller = controller.clone();
            let run = tokio::task::spawn_blocking(move || {
                let sink = move |event: ProgressEvent| {
                    progress_controller.state.lock().progress_label = format_progress(&event);
                };
                engine.recognize(file.path(), &lang_spec, &sink)
            });

            let outcome = match run.await {
                Ok(outcome) => outcome,
                Err(err) => Err(OcrError::Internal(format!("recognition aborted: {}", err))),
            };
            controller.complete_recognition(outcome)
        });

        match task.await {
            Ok(outcome) => outcome,
            Err(err) => Err(OcrError::Internal(format!(
                "recognition task failed: {}",
                err
            ))),
        }
    }

    /// Record the outcome of a recognition run and clear the busy flag.
    /// A failure leaves the previous result text untouched.
    fn complete_recognition(&self, outcome: Result<String, OcrError>) -> Result<String, OcrError> {
        let mut state = self.state.lock();
        state.busy = false;
        match &outcome {
            Ok(text) => {
                tracing::info!("Recognition complete ({} chars)", text.len());
                state.result_text = text.clone();
                state.progress_label = "done".to_string();
            }
            Err(err) => {
                tracing::error!("Recognition failed: {}", err);
                state.progress_label = "error".to_string();
            }
        }
        outcome
    }

    /// Put the current result text on the system clipboard.
    pub fn copy_result(&self) -> Result<&'static str, OcrError> {
        let text = self.state.lock().result_text.clone();
        self.clipboard.write_text(&text)?;
        Ok("Copied!")
    }

    /// Persist the current result text under the fixed storage key.
    pub fn save_result(&self) -> Result<&'static str, OcrError> {
        let text = self.state.lock().result_text.clone();
        self.store.save(&text)?;
        Ok("Saved locally.")
    }

    pub fn result_text(&self) -> String {
        self.state.lock().result_text.clone()
    }

    /// Stored bytes of the selected file, served back under the declared
    /// media type.
    pub fn preview(&self) -> Result<(String, Vec<u8>), OcrError> {
        let file = self
            .state
            .lock()
            .selected_file
            .clone()
            .ok_or(OcrError::MissingFile)?;
        let bytes = std::fs::read(file.path())
            .map_err(|e| OcrError::Internal(format!("could not read stored file: {}", e)))?;
        Ok((file.media_type.clone(), bytes))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot_locked(&self.state.lock())
    }

    fn snapshot_locked(&self, state: &SessionState) -> SessionSnapshot {
        SessionSnapshot {
            file: state.selected_file.as_deref().map(FileInfo::of),
            preview_url: state.selected_file.is_some().then(|| "/preview".to_string()),
            progress_label: state.progress_label.clone(),
            result_text: state.result_text.clone(),
            busy: state.busy,
            engine: self.engine.as_ref().ok().map(|e| e.name().to_string()),
        }
    }

    /// The selected engine, or the reason probing found none.
    pub fn engine_status(&self) -> Result<&dyn OcrEngine, &str> {
        match &self.engine {
            Ok(engine) => Ok(engine.as_ref()),
            Err(reason) => Err(reason.as_str()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Directory the result text is persisted under.
    pub fn storage_dir(&self) -> &std::path::Path {
        self.store.dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{ProgressSink, RECOGNIZING_TEXT};
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::time::Duration;

    struct ScriptedEngine {
        /// Outcomes played back one per call, in order; the last repeats.
        outcomes: Mutex<Vec<Result<String, String>>>,
        calls: AtomicUsize,
        specs: Mutex<Vec<String>>,
    }

    impl ScriptedEngine {
        fn ok(text: &str) -> Arc<Self> {
            Self::scripted(vec![Ok(text.to_string())])
        }

        fn failing(message: &str) -> Arc<Self> {
            Self::scripted(vec![Err(message.to_string())])
        }

        fn scripted(outcomes: Vec<Result<String, String>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes),
                calls: AtomicUsize::new(0),
                specs: Mutex::new(Vec::new()),
            })
        }
    }

    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn description(&self) -> String {
            "scripted test engine".to_string()
        }

        fn recognize(
            &self,
            _image: &Path,
            lang_spec: &str,
            _progress: &ProgressSink<'_>,
        ) -> Result<String, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.specs.lock().push(lang_spec.to_string());
            let mut outcomes = self.outcomes.lock();
            let outcome = if outcomes.len() > 1 {
                outcomes.remove(0)
            } else {
                outcomes[0].clone()
            };
            outcome.map_err(|message| OcrError::engine_failure("scripted", message))
        }
    }

    /// Emits one progress event, then blocks until the test releases it.
    struct GatedEngine {
        resume: Mutex<mpsc::Receiver<()>>,
    }

    impl GatedEngine {
        fn new() -> (Arc<Self>, mpsc::Sender<()>) {
            let (release, resume) = mpsc::channel();
            (
                Arc::new(Self {
                    resume: Mutex::new(resume),
                }),
                release,
            )
        }
    }

    impl OcrEngine for GatedEngine {
        fn name(&self) -> &'static str {
            "gated"
        }

        fn description(&self) -> String {
            "gated test engine".to_string()
        }

        fn recognize(
            &self,
            _image: &Path,
            _lang_spec: &str,
            progress: &ProgressSink<'_>,
        ) -> Result<String, OcrError> {
            progress(ProgressEvent::fraction(RECOGNIZING_TEXT, 0.5));
            let _ = self.resume.lock().recv();
            Ok("Hello".to_string())
        }
    }

    struct RecordingClipboard {
        writes: Arc<Mutex<Vec<String>>>,
    }

    impl Clipboard for RecordingClipboard {
        fn write_text(&self, text: &str) -> Result<(), OcrError> {
            self.writes.lock().push(text.to_string());
            Ok(())
        }
    }

    fn test_config() -> Config {
        Config {
            host: "127.0.0.1".to_string(),
            port: 0,
            default_language: "eng".to_string(),
            max_file_size: 1024,
            tesseract_cmd: "tesseract".to_string(),
            tessdata_path: None,
            lang_path: "https://example.test/tessdata".to_string(),
            ocr_endpoint: None,
            data_dir: None,
        }
    }

    struct Harness {
        controller: Arc<SessionController>,
        writes: Arc<Mutex<Vec<String>>>,
        data_dir: tempfile::TempDir,
    }

    fn harness(engine: Result<Arc<dyn OcrEngine>, String>) -> Harness {
        let data_dir = tempfile::tempdir().expect("tempdir");
        let writes = Arc::new(Mutex::new(Vec::new()));
        let controller = Arc::new(SessionController::with_parts(
            test_config(),
            engine,
            LocalStore::new(data_dir.path().to_path_buf()),
            Box::new(RecordingClipboard {
                writes: writes.clone(),
            }),
        ));
        Harness {
            controller,
            writes,
            data_dir,
        }
    }

    #[tokio::test]
    async fn rejecting_a_non_image_leaves_state_untouched() {
        let h = harness(Ok(ScriptedEngine::ok("unused")));

        let err = h
            .controller
            .select_file("report.pdf", "application/pdf", b"%PDF-")
            .err()
            .expect("must reject");

        assert!(err.to_string().contains("Please upload an image (JPG, PNG)."));
        let snap = h.controller.snapshot();
        assert!(snap.file.is_none());
        assert_eq!(snap.progress_label, "idle");
    }

    #[tokio::test]
    async fn oversize_file_is_rejected() {
        let h = harness(Ok(ScriptedEngine::ok("unused")));

        let big = vec![0u8; 2048];
        let err = h
            .controller
            .select_file("big.png", "image/png", &big)
            .err()
            .expect("must reject");

        assert!(matches!(err, OcrError::FileTooLarge { size: 2048, max: 1024 }));
        assert!(h.controller.snapshot().file.is_none());
    }

    #[tokio::test]
    async fn selecting_an_image_readies_the_session() {
        let h = harness(Ok(ScriptedEngine::ok("unused")));

        let snap = h
            .controller
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");

        assert_eq!(snap.progress_label, "ready");
        assert!(!snap.busy);
        assert_eq!(snap.preview_url.as_deref(), Some("/preview"));
        assert_eq!(snap.engine.as_deref(), Some("scripted"));
        let file = snap.file.expect("file info");
        assert_eq!(file.name, "scan.png");
        assert_eq!(file.media_type, "image/png");
        assert_eq!(file.size, 9);

        let (media_type, bytes) = h.controller.preview().expect("preview");
        assert_eq!(media_type, "image/png");
        assert_eq!(bytes, b"png-bytes");
    }

    #[tokio::test]
    async fn clear_returns_to_the_initial_state() {
        let h = harness(Ok(ScriptedEngine::ok("unused")));
        h.controller
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");

        let snap = h.controller.clear();

        assert!(snap.file.is_none());
        assert!(snap.preview_url.is_none());
        assert_eq!(snap.progress_label, "idle");
        assert!(matches!(
            h.controller.preview().err(),
            Some(OcrError::MissingFile)
        ));
    }

    #[tokio::test]
    async fn recognize_without_a_file_never_reaches_the_engine() {
        let engine = ScriptedEngine::ok("unused");
        let h = harness(Ok(engine.clone()));

        let err = h
            .controller
            .clone()
            .start_recognition(vec![], false)
            .await
            .err()
            .expect("must reject");

        assert!(matches!(err, OcrError::MissingFile));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        let snap = h.controller.snapshot();
        assert_eq!(snap.progress_label, "idle");
        assert!(!snap.busy);
    }

    #[tokio::test]
    async fn many_languages_require_confirmation() {
        let engine = ScriptedEngine::ok("Vier");
        let h = harness(Ok(engine.clone()));
        h.controller
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");

        let languages: Vec<String> = ["eng", "fra", "deu", "spa"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let err = h
            .controller
            .clone()
            .start_recognition(languages.clone(), false)
            .await
            .err()
            .expect("must ask for confirmation");
        assert!(matches!(err, OcrError::ConfirmationRequired { count: 4 }));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert!(!h.controller.snapshot().busy);

        let text = h
            .controller
            .clone()
            .start_recognition(languages, true)
            .await
            .expect("confirmed run");
        assert_eq!(text, "Vier");
        assert_eq!(*engine.specs.lock(), vec!["eng+fra+deu+spa".to_string()]);
    }

    #[tokio::test]
    async fn busy_session_rejects_a_second_trigger() {
        let (engine, release) = GatedEngine::new();
        let h = harness(Ok(engine));
        h.controller
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");

        let run = tokio::spawn({
            let controller = h.controller.clone();
            async move { controller.start_recognition(vec![], false).await }
        });

        let mut observed_mid_run = false;
        for _ in 0..500 {
            let snap = h.controller.snapshot();
            if snap.busy && snap.progress_label == "recognizing: 50%" {
                observed_mid_run = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(observed_mid_run, "never saw the session go busy");

        let err = h
            .controller
            .clone()
            .start_recognition(vec![], false)
            .await
            .err()
            .expect("second trigger must be rejected");
        assert!(matches!(err, OcrError::Busy));

        release.send(()).expect("release engine");
        let text = run.await.expect("join").expect("recognition");
        assert_eq!(text, "Hello");

        let snap = h.controller.snapshot();
        assert!(!snap.busy);
        assert_eq!(snap.progress_label, "done");
        assert_eq!(snap.result_text, "Hello");
    }

    #[tokio::test]
    async fn saved_result_is_restored_at_startup() {
        let data_dir = tempfile::tempdir().expect("tempdir");
        LocalStore::new(data_dir.path().to_path_buf())
            .save("previously saved text")
            .expect("seed store");

        let restored = SessionController::with_parts(
            test_config(),
            Ok(ScriptedEngine::ok("unused")),
            LocalStore::new(data_dir.path().to_path_buf()),
            Box::new(RecordingClipboard {
                writes: Arc::new(Mutex::new(Vec::new())),
            }),
        );

        assert_eq!(restored.result_text(), "previously saved text");
        assert_eq!(restored.snapshot().progress_label, "idle");

        // accepting a file resets the session, restored text included
        let snap = restored
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");
        assert_eq!(snap.result_text, "");
    }

    #[tokio::test]
    async fn copy_sends_the_result_to_the_clipboard() {
        let engine = ScriptedEngine::ok("Copy me");
        let h = harness(Ok(engine));
        h.controller
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");
        h.controller
            .clone()
            .start_recognition(vec![], false)
            .await
            .expect("recognition");

        let ack = h.controller.copy_result().expect("copy");

        assert_eq!(ack, "Copied!");
        assert_eq!(*h.writes.lock(), vec!["Copy me".to_string()]);
    }

    #[tokio::test]
    async fn save_persists_the_current_result() {
        let engine = ScriptedEngine::ok("Persist me");
        let h = harness(Ok(engine));
        h.controller
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");
        h.controller
            .clone()
            .start_recognition(vec![], false)
            .await
            .expect("recognition");

        let ack = h.controller.save_result().expect("save");

        assert_eq!(ack, "Saved locally.");
        let reread = LocalStore::new(h.data_dir.path().to_path_buf())
            .load_last()
            .expect("load");
        assert_eq!(reread.as_deref(), Some("Persist me"));
    }

    #[tokio::test]
    async fn missing_capability_marks_the_session_error() {
        let h = harness(Err(
            "`tesseract` not found on PATH (install tesseract-ocr)".to_string()
        ));
        h.controller
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");

        let err = h
            .controller
            .clone()
            .start_recognition(vec![], false)
            .await
            .err()
            .expect("must fail");

        assert!(matches!(err, OcrError::EngineUnavailable(_)));
        assert!(err.to_string().contains("not found"), "got: {}", err);
        let snap = h.controller.snapshot();
        assert_eq!(snap.progress_label, "error");
        assert!(!snap.busy);
        assert!(snap.engine.is_none());
    }

    #[tokio::test]
    async fn failed_recognition_keeps_the_previous_result() {
        let engine = ScriptedEngine::scripted(vec![
            Ok("First pass".to_string()),
            Err("image unreadable".to_string()),
        ]);
        let h = harness(Ok(engine.clone()));
        h.controller
            .select_file("scan.png", "image/png", b"png-bytes")
            .expect("select");

        let text = h
            .controller
            .clone()
            .start_recognition(vec![], false)
            .await
            .expect("first run");
        assert_eq!(text, "First pass");

        let err = h
            .controller
            .clone()
            .start_recognition(vec![], false)
            .await
            .err()
            .expect("second run must fail");

        assert!(err.to_string().contains("image unreadable"));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
        let snap = h.controller.snapshot();
        assert_eq!(snap.progress_label, "error");
        assert_eq!(snap.result_text, "First pass");
        assert!(!snap.busy);
    }
}
