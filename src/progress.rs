//! Progress events flowing from the OCR engine back to the session.
//!
//! Both engine variants report `{status, progress?}` events through a
//! callback. The session renders them with one formatter so every call
//! site produces identical labels.

/// Status reported while text extraction is running. Both engine variants
/// use it, and the formatter gives it a shorter label than other phases.
pub const RECOGNIZING_TEXT: &str = "recognizing text";

/// A single progress report from the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// Phase name, e.g. "loading language traineddata".
    pub status: String,
    /// Fraction complete within the phase (0.0..=1.0), when known.
    pub progress: Option<f32>,
}

impl ProgressEvent {
    pub fn phase(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            progress: None,
        }
    }

    pub fn fraction(status: impl Into<String>, progress: f32) -> Self {
        Self {
            status: status.into(),
            progress: Some(progress),
        }
    }
}

/// Callback carrying progress events out of a running recognition.
///
/// The lifetime lets callers hand the engine a sink that borrows local
/// state instead of requiring an owned `'static` closure.
pub type ProgressSink<'a> = dyn Fn(ProgressEvent) + Send + Sync + 'a;

/// Map a progress event to the label shown to the user.
///
/// The recognizing phase gets a compact percentage label. Other phases
/// show their name, with a percentage appended when a meaningful fraction
/// is present (a zero fraction reads as "not started" and is omitted). An
/// empty status falls back to a generic label.
pub fn format_progress(event: &ProgressEvent) -> String {
    match (event.status.as_str(), event.progress) {
        (RECOGNIZING_TEXT, Some(p)) => format!("recognizing: {}%", round_percent(p)),
        (status, Some(p)) if p > 0.0 && !status.is_empty() => {
            format!("{} {}%", status, round_percent(p))
        }
        ("", _) => "working".to_string(),
        (status, _) => status.to_string(),
    }
}

fn round_percent(progress: f32) -> i32 {
    (progress * 100.0).round() as i32
}
