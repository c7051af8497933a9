use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    MedicineScan,
    MedicalReport,
}

impl DocumentKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MedicineScan => "medicine_scan",
            Self::MedicalReport => "medical_report",
        }
    }
}

impl std::fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File formats the extractor has a handler for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Jpeg,
    Png,
    Webp,
    Pdf,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "webp" => Some(Self::Webp),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }

    pub fn from_filename(name: &str) -> Option<Self> {
        Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }

    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Pdf => "pdf",
        }
    }
}

/// A validated incoming upload. Owned by exactly one pipeline run.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    bytes: Vec<u8>,
    filename: String,
    kind: DocumentKind,
    submitter: String,
    description: Option<String>,
}

impl UploadRequest {
    /// Validate and build an upload. Directory components in `filename` are
    /// discarded; empty content or a blank name is rejected.
    pub fn new(
        bytes: Vec<u8>,
        filename: &str,
        kind: DocumentKind,
        submitter: impl Into<String>,
    ) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidUpload("file is empty".into()));
        }

        let filename = Path::new(filename.trim())
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| Error::InvalidUpload(format!("bad filename: {filename:?}")))?
            .to_string();

        Ok(Self {
            bytes,
            filename,
            kind,
            submitter: submitter.into(),
            description: None,
        })
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn kind(&self) -> DocumentKind {
        self.kind
    }

    pub fn submitter(&self) -> &str {
        &self.submitter
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

/// Every failure the extraction and structuring stages can recover from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnsupportedFormat,
    EncryptedSource,
    EngineFailure,
    UpstreamRateLimited,
    UpstreamError,
    UnexpectedFailure,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat => "unsupported_format",
            Self::EncryptedSource => "encrypted_source",
            Self::EngineFailure => "engine_failure",
            Self::UpstreamRateLimited => "upstream_rate_limited",
            Self::UpstreamError => "upstream_error",
            Self::UnexpectedFailure => "unexpected_failure",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    Ok,
    UnsupportedFormat,
    EncryptedSource,
    EngineFailure,
}

impl ExtractionStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::UnsupportedFormat => "unsupported_format",
            Self::EncryptedSource => "encrypted_source",
            Self::EngineFailure => "engine_failure",
        }
    }

    /// The recoverable failure this status stands for, if any
    #[must_use]
    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            Self::Ok => None,
            Self::UnsupportedFormat => Some(FailureKind::UnsupportedFormat),
            Self::EncryptedSource => Some(FailureKind::EncryptedSource),
            Self::EngineFailure => Some(FailureKind::EngineFailure),
        }
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ExtractionStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ok" => Ok(Self::Ok),
            "unsupported_format" => Ok(Self::UnsupportedFormat),
            "encrypted_source" => Ok(Self::EncryptedSource),
            "engine_failure" => Ok(Self::EngineFailure),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub status: ExtractionStatus,
}

impl ExtractedText {
    #[must_use]
    pub fn ok(text: String) -> Self {
        Self {
            text,
            status: ExtractionStatus::Ok,
        }
    }

    #[must_use]
    pub fn failed(status: ExtractionStatus) -> Self {
        Self {
            text: String::new(),
            status,
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == ExtractionStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructuringOrigin {
    AiSuccess,
    AiRateLimited,
    AiError,
    ExtractionFailed,
}

impl StructuringOrigin {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AiSuccess => "ai_success",
            Self::AiRateLimited => "ai_rate_limited",
            Self::AiError => "ai_error",
            Self::ExtractionFailed => "extraction_failed",
        }
    }
}

impl std::fmt::Display for StructuringOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for StructuringOrigin {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ai_success" => Ok(Self::AiSuccess),
            "ai_rate_limited" => Ok(Self::AiRateLimited),
            "ai_error" => Ok(Self::AiError),
            "extraction_failed" => Ok(Self::ExtractionFailed),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// Output of the structuring stage. On anything but `AiSuccess`, `text` is a
/// human-readable fallback message rather than JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredResult {
    pub text: String,
    pub origin: StructuringOrigin,
}

impl StructuredResult {
    #[must_use]
    pub fn success(text: String) -> Self {
        Self {
            text,
            origin: StructuringOrigin::AiSuccess,
        }
    }

    #[must_use]
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            origin: StructuringOrigin::AiRateLimited,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            origin: StructuringOrigin::AiError,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.origin == StructuringOrigin::AiSuccess
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_filename() {
        assert_eq!(FileFormat::from_filename("label.JPG"), Some(FileFormat::Jpeg));
        assert_eq!(FileFormat::from_filename("a.b.jpeg"), Some(FileFormat::Jpeg));
        assert_eq!(FileFormat::from_filename("scan.webp"), Some(FileFormat::Webp));
        assert_eq!(FileFormat::from_filename("report.pdf"), Some(FileFormat::Pdf));
        assert_eq!(FileFormat::from_filename("notes.docx"), None);
        assert_eq!(FileFormat::from_filename("README"), None);
    }

    #[test]
    fn test_upload_strips_directories() {
        let upload = UploadRequest::new(
            vec![1, 2, 3],
            "../../etc/label.png",
            DocumentKind::MedicineScan,
            "patient-1",
        )
        .unwrap();

        assert_eq!(upload.filename(), "label.png");
    }

    #[test]
    fn test_upload_rejects_empty_bytes() {
        let result = UploadRequest::new(Vec::new(), "a.png", DocumentKind::MedicineScan, "p");

        assert!(matches!(result, Err(Error::InvalidUpload(_))));
    }

    #[test]
    fn test_upload_rejects_blank_name() {
        let result = UploadRequest::new(vec![0], "   ", DocumentKind::MedicalReport, "p");

        assert!(matches!(result, Err(Error::InvalidUpload(_))));
    }

    #[test]
    fn test_status_failure_mapping() {
        assert_eq!(ExtractionStatus::Ok.failure(), None);
        assert_eq!(
            ExtractionStatus::EncryptedSource.failure(),
            Some(FailureKind::EncryptedSource)
        );
        assert_eq!(
            "engine_failure".parse::<ExtractionStatus>().unwrap(),
            ExtractionStatus::EngineFailure
        );
        assert!("bogus".parse::<StructuringOrigin>().is_err());
    }
}
