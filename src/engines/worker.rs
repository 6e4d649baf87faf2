//! Worker engine: a spawned tesseract process per request.
//!
//! The engine walks the full worker lifecycle in strict order (load,
//! load language, initialize, recognize) and terminates the process on
//! every exit path. Traineddata files are downloaded into a managed
//! directory on first use.

use crate::config::Config;
use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::progress::{ProgressEvent, ProgressSink, RECOGNIZING_TEXT};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub struct WorkerEngine {
    cmd: String,
    tessdata_dir: PathBuf,
    lang_path: String,
}

impl WorkerEngine {
    /// Check whether this environment can spawn a tesseract worker.
    ///
    /// The binary must run and its `--version` banner must identify a
    /// tesseract build; a binary that runs but answers with something
    /// else is treated as unavailable so probing can fall through to the
    /// next capability. The returned `Err` is the reason, for logging.
    pub fn probe(config: &Config) -> Result<Self, String> {
        let output = Command::new(&config.tesseract_cmd).arg("--version").output();

        match output {
            Ok(output) if output.status.success() => {
                let mut banner = String::from_utf8_lossy(&output.stdout).to_string();
                // older tesseract builds print the version to stderr
                banner.push_str(&String::from_utf8_lossy(&output.stderr));

                if banner.to_lowercase().contains("tesseract") {
                    Ok(Self {
                        cmd: config.tesseract_cmd.clone(),
                        tessdata_dir: config.tessdata_dir(),
                        lang_path: config.lang_path.trim_end_matches('/').to_string(),
                    })
                } else {
                    Err(format!(
                        "`{} --version` did not identify a tesseract build",
                        config.tesseract_cmd
                    ))
                }
            }
            Ok(output) => Err(format!(
                "`{} --version` exited with {}",
                config.tesseract_cmd, output.status
            )),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(format!(
                "`{}` not found on PATH (install tesseract-ocr)",
                config.tesseract_cmd
            )),
            Err(e) => Err(format!("could not run `{}`: {}", config.tesseract_cmd, e)),
        }
    }

    /// Lifecycle step 1: confirm the binary still answers before any time
    /// is spent on traineddata.
    fn load(&self, progress: &ProgressSink<'_>) -> Result<(), OcrError> {
        progress(ProgressEvent::phase("loading tesseract core"));

        let output = Command::new(&self.cmd).arg("--version").output().map_err(|e| {
            OcrError::engine_failure("worker load", format!("could not run `{}`: {}", self.cmd, e))
        })?;
        if !output.status.success() {
            return Err(OcrError::engine_failure(
                "worker load",
                format!("`{} --version` exited with {}", self.cmd, output.status),
            ));
        }
        Ok(())
    }

    /// Lifecycle step 2: every selected language needs its traineddata
    /// present before tesseract can initialize with it.
    fn load_language(&self, lang_spec: &str, progress: &ProgressSink<'_>) -> Result<(), OcrError> {
        progress(ProgressEvent::phase("loading language traineddata"));

        let codes: Vec<&str> = lang_spec.split('+').filter(|c| !c.is_empty()).collect();
        let total = codes.len();
        for (i, code) in codes.iter().enumerate() {
            self.ensure_traineddata(code)?;
            progress(ProgressEvent::fraction(
                "loading language traineddata",
                (i + 1) as f32 / total as f32,
            ));
        }
        Ok(())
    }

    /// Lifecycle step 3: assemble the invocation. `stdout` as the output
    /// target keeps everything on pipes, no output files to clean up.
    fn initialize(&self, image: &Path, lang_spec: &str, progress: &ProgressSink<'_>) -> Command {
        progress(ProgressEvent::phase("initializing tesseract"));

        let mut command = Command::new(&self.cmd);
        command
            .arg(image)
            .arg("stdout")
            .args(["-l", lang_spec])
            .env("TESSDATA_PREFIX", &self.tessdata_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        command
    }

    /// Lifecycle step 4: run the worker under the termination guard.
    fn run(&self, mut command: Command, progress: &ProgressSink<'_>) -> Result<String, OcrError> {
        progress(ProgressEvent::fraction(RECOGNIZING_TEXT, 0.0));

        let child = command.spawn().map_err(|e| {
            OcrError::engine_failure(
                "worker recognize",
                format!("failed to spawn `{}`: {}", self.cmd, e),
            )
        })?;

        let guard = WorkerGuard::new(child);
        let output = guard
            .wait_with_output()
            .map_err(|e| OcrError::engine_failure("worker recognize", e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = if stderr.trim().is_empty() {
                format!("tesseract exited with {}", output.status)
            } else {
                stderr.trim().to_string()
            };
            return Err(OcrError::engine_failure("worker recognize", message));
        }

        progress(ProgressEvent::fraction(RECOGNIZING_TEXT, 1.0));
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Download the traineddata for a language code if it is not cached.
    fn ensure_traineddata(&self, code: &str) -> Result<(), OcrError> {
        std::fs::create_dir_all(&self.tessdata_dir).map_err(|e| {
            OcrError::engine_failure(
                "worker load language",
                format!("failed to create tessdata directory: {}", e),
            )
        })?;

        let traineddata_path = self.tessdata_dir.join(format!("{}.traineddata", code));
        if traineddata_path.exists() {
            tracing::debug!("Using cached traineddata for '{}'", code);
            return Ok(());
        }

        let url = format!("{}/{}.traineddata", self.lang_path, code);
        tracing::info!(
            "Downloading traineddata for '{}' (this may take a moment)...",
            code
        );
        download_file(&url, &traineddata_path)?;
        tracing::info!("Downloaded traineddata to {:?}", traineddata_path);
        Ok(())
    }
}

impl OcrEngine for WorkerEngine {
    fn name(&self) -> &'static str {
        "worker"
    }

    fn description(&self) -> String {
        format!(
            "spawned `{}` process (tessdata: {})",
            self.cmd,
            self.tessdata_dir.display()
        )
    }

    fn recognize(
        &self,
        image: &Path,
        lang_spec: &str,
        progress: &ProgressSink<'_>,
    ) -> Result<String, OcrError> {
        self.load(progress)?;
        self.load_language(lang_spec, progress)?;
        let command = self.initialize(image, lang_spec, progress);
        self.run(command, progress)
    }
}

/// Keeps the spawned worker from outliving its request.
///
/// The process is reaped on the success path via `wait_with_output`; a
/// guard dropped any other way kills the child first.
struct WorkerGuard {
    child: Option<std::process::Child>,
}

impl WorkerGuard {
    fn new(child: std::process::Child) -> Self {
        Self { child: Some(child) }
    }

    fn wait_with_output(mut self) -> std::io::Result<std::process::Output> {
        match self.child.take() {
            Some(child) => child.wait_with_output(),
            None => Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                "worker already terminated",
            )),
        }
    }
}

impl Drop for WorkerGuard {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

/// Download a file from URL to path using ureq
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url).call().map_err(|e| {
        OcrError::engine_failure(
            "worker load language",
            format!("failed to download traineddata: {}", e),
        )
    })?;

    // read the whole body before touching the cache path, so a failed
    // download never leaves a truncated traineddata behind; the streaming
    // reader has no body-size cap, traineddata can run past 10MB
    let mut buffer = Vec::new();
    response
        .into_body()
        .into_reader()
        .read_to_end(&mut buffer)
        .map_err(|e| {
            OcrError::engine_failure(
                "worker load language",
                format!("failed to read traineddata response: {}", e),
            )
        })?;

    let mut file = File::create(path).map_err(|e| {
        OcrError::engine_failure(
            "worker load language",
            format!("failed to create traineddata file: {}", e),
        )
    })?;
    file.write_all(&buffer).map_err(|e| {
        OcrError::engine_failure(
            "worker load language",
            format!("failed to write traineddata file: {}", e),
        )
    })?;

    Ok(())
}
