use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ocrai-server")]
#[command(about = "Local OCR backend for the OCR.ai image-to-text page")]
#[command(version)]
pub struct Args {
    /// Host address to bind to
    #[arg(long, env = "OCRAI_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(long, env = "OCRAI_PORT", default_value = "8991")]
    pub port: u16,

    /// Language used when the request selects none (e.g., "eng", "deu", "fra")
    #[arg(long, env = "OCRAI_DEFAULT_LANGUAGE", default_value = "eng")]
    pub default_language: String,

    /// Maximum upload size in bytes (default: 50MB)
    #[arg(long, env = "OCRAI_MAX_FILE_SIZE", default_value = "52428800")]
    pub max_file_size: usize,

    /// Tesseract executable driven by the worker engine
    #[arg(long, env = "OCRAI_TESSERACT_CMD", default_value = "tesseract")]
    pub tesseract_cmd: String,

    /// Directory holding traineddata (uses TESSDATA_PREFIX env var if not set;
    /// defaults to a managed cache directory)
    #[arg(long, env = "TESSDATA_PREFIX")]
    pub tessdata_path: Option<PathBuf>,

    /// Base URL for traineddata downloads
    #[arg(
        long,
        env = "OCRAI_LANG_PATH",
        default_value = "https://github.com/tesseract-ocr/tessdata_fast/raw/main"
    )]
    pub lang_path: String,

    /// Remote OCR endpoint used when no tesseract binary is available
    #[arg(long, env = "OCRAI_OCR_ENDPOINT")]
    pub ocr_endpoint: Option<String>,

    /// Directory for locally saved results (defaults to the user data dir)
    #[arg(long, env = "OCRAI_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub default_language: String,
    pub max_file_size: usize,
    pub tesseract_cmd: String,
    pub tessdata_path: Option<PathBuf>,
    pub lang_path: String,
    pub ocr_endpoint: Option<String>,
    pub data_dir: Option<PathBuf>,
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        Self {
            host: args.host,
            port: args.port,
            default_language: args.default_language,
            max_file_size: args.max_file_size,
            tesseract_cmd: args.tesseract_cmd,
            tessdata_path: args.tessdata_path,
            lang_path: args.lang_path,
            ocr_endpoint: args.ocr_endpoint,
            data_dir: args.data_dir,
        }
    }
}

impl Config {
    /// Directory where the worker engine keeps traineddata files.
    pub fn tessdata_dir(&self) -> PathBuf {
        self.tessdata_path.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("ocrai")
                .join("tessdata")
        })
    }

    /// Directory where locally saved results live.
    pub fn storage_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("ocrai")
        })
    }
}
