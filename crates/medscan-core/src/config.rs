use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{Error, Result};

/// Default text-generation endpoint (Gemini `generateContent`)
pub const DEFAULT_AI_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent";

/// Runtime configuration, injected into each component at construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding records, catalog and pending queue
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Text-generation endpoint
    #[serde(default = "default_ai_url")]
    pub ai_url: String,

    /// API key sent with every structuring request
    #[serde(default)]
    pub ai_api_key: String,

    /// Per-request timeout for the structuring call
    #[serde(default = "default_ai_timeout")]
    pub ai_timeout_seconds: u32,

    /// Language the model is asked to answer in
    #[serde(default = "default_response_language")]
    pub response_language: String,

    /// Tesseract language data directory (tesseract's own default when unset)
    #[serde(default)]
    pub tessdata_dir: Option<PathBuf>,

    /// Tesseract language model
    #[serde(default = "default_ocr_language")]
    pub ocr_language: String,

    /// Where decoded copies of uploads are written during extraction
    #[serde(default = "std::env::temp_dir")]
    pub scratch_dir: PathBuf,

    /// Root of the blob store; scans and reports go in subdirectories
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,

    /// Deadline for extraction plus structuring of one upload
    #[serde(default = "default_upload_timeout")]
    pub upload_timeout_seconds: u32,
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("medscan"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn default_database_path() -> PathBuf {
    default_data_dir().join("medscan.db")
}

fn default_upload_dir() -> PathBuf {
    default_data_dir().join("uploads")
}

fn default_ai_url() -> String {
    DEFAULT_AI_URL.to_string()
}

fn default_ai_timeout() -> u32 {
    60
}

fn default_response_language() -> String {
    "English".to_string()
}

fn default_ocr_language() -> String {
    "eng".to_string()
}

fn default_upload_timeout() -> u32 {
    180
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            ai_url: default_ai_url(),
            ai_api_key: String::new(),
            ai_timeout_seconds: default_ai_timeout(),
            response_language: default_response_language(),
            tessdata_dir: None,
            ocr_language: default_ocr_language(),
            scratch_dir: std::env::temp_dir(),
            upload_dir: default_upload_dir(),
            upload_timeout_seconds: default_upload_timeout(),
        }
    }
}

impl Config {
    /// Build a configuration from `MEDSCAN_*` environment variables,
    /// falling back to defaults for anything unset or unparsable
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(v) = std::env::var("MEDSCAN_DB") {
            config.database_path = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDSCAN_AI_URL") {
            config.ai_url = v;
        }
        if let Ok(v) = std::env::var("MEDSCAN_AI_KEY") {
            config.ai_api_key = v;
        }
        if let Some(v) = env_u32("MEDSCAN_AI_TIMEOUT_SECS") {
            config.ai_timeout_seconds = v;
        }
        if let Ok(v) = std::env::var("MEDSCAN_RESPONSE_LANGUAGE") {
            config.response_language = v;
        }
        if let Ok(v) = std::env::var("MEDSCAN_TESSDATA") {
            config.tessdata_dir = Some(PathBuf::from(v));
        }
        if let Ok(v) = std::env::var("MEDSCAN_OCR_LANGUAGE") {
            config.ocr_language = v;
        }
        if let Ok(v) = std::env::var("MEDSCAN_SCRATCH_DIR") {
            config.scratch_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("MEDSCAN_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = env_u32("MEDSCAN_UPLOAD_TIMEOUT_SECS") {
            config.upload_timeout_seconds = v;
        }

        config
    }

    /// Reject configurations that cannot work at all
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.ai_url)
            .map_err(|e| Error::Config(format!("ai_url {}: {e}", self.ai_url)))?;

        if self.ai_timeout_seconds == 0 {
            return Err(Error::Config("ai_timeout_seconds must be positive".into()));
        }
        if self.upload_timeout_seconds == 0 {
            return Err(Error::Config("upload_timeout_seconds must be positive".into()));
        }
        if self.ocr_language.trim().is_empty() {
            return Err(Error::Config("ocr_language must not be empty".into()));
        }

        Ok(())
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.ai_timeout_seconds))
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.upload_timeout_seconds))
    }

    pub fn scan_upload_dir(&self) -> PathBuf {
        self.upload_dir.join("medicine_images")
    }

    pub fn report_upload_dir(&self) -> PathBuf {
        self.upload_dir.join("reports")
    }
}

fn env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
