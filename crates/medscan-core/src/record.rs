use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::document::{DocumentKind, ExtractionStatus, FailureKind, StructuringOrigin};
use crate::{Error, Result};

/// Review state a newly analysed report starts in
pub const REVIEW_COMPLETED: &str = "Completed";
pub const REVIEW_PENDING: &str = "Pending Review";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Complete,
    FailedFallback,
}

impl RecordStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::FailedFallback => "failed_fallback",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "complete" => Ok(Self::Complete),
            "failed_fallback" => Ok(Self::FailedFallback),
            _ => Err(Error::InvalidStatus(s.to_string())),
        }
    }
}

/// Fields shared by both record kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordBody {
    pub id: Uuid,
    pub file_locator: String,
    pub original_filename: String,
    pub extracted_text: String,
    pub extraction_status: ExtractionStatus,
    pub structured_data: String,
    pub structuring_origin: StructuringOrigin,
    pub status: RecordStatus,
    pub submitter: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanRecord {
    #[serde(flatten)]
    pub body: RecordBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRecord {
    #[serde(flatten)]
    pub body: RecordBody,
    pub report_type: String,
    pub report_date: NaiveDate,
    pub description: Option<String>,
    pub review_status: String,
}

/// Placeholder payloads written into `structured_data` when a stage fails,
/// shaped like the schema of each document kind
pub mod envelope {
    use super::{json, DocumentKind, FailureKind};

    /// Envelope for an upload whose text could not be extracted
    pub fn extraction_failed(kind: DocumentKind, failure: FailureKind) -> String {
        let message = extraction_message(failure);
        let value = match kind {
            DocumentKind::MedicineScan => json!({
                "error": message,
                "failure": failure.as_str(),
            }),
            DocumentKind::MedicalReport => json!({
                "summary": message,
                "testResults": [],
                "failure": failure.as_str(),
            }),
        };
        value.to_string()
    }

    /// Envelope wrapping the structuring client's fallback message
    pub fn structuring_failed(kind: DocumentKind, message: &str) -> String {
        let value = match kind {
            DocumentKind::MedicineScan => json!({ "error": message }),
            DocumentKind::MedicalReport => json!({ "summary": message, "testResults": [] }),
        };
        value.to_string()
    }

    fn extraction_message(failure: FailureKind) -> &'static str {
        match failure {
            FailureKind::UnsupportedFormat => "Unsupported file type.",
            FailureKind::EncryptedSource => "Encrypted PDF files are not supported.",
            FailureKind::EngineFailure => "Failed to extract text from the uploaded file.",
            _ => "Text extraction failed.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structuring_envelopes() {
        assert_eq!(
            envelope::structuring_failed(DocumentKind::MedicalReport, "busy"),
            r#"{"summary":"busy","testResults":[]}"#
        );
        assert_eq!(
            envelope::structuring_failed(DocumentKind::MedicineScan, "busy"),
            r#"{"error":"busy"}"#
        );
    }

    #[test]
    fn test_extraction_envelope_names_failure() {
        let text =
            envelope::extraction_failed(DocumentKind::MedicineScan, FailureKind::EncryptedSource);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["failure"], "encrypted_source");
        assert!(value["error"].is_string());
    }

    #[test]
    fn test_report_extraction_envelope_keeps_schema() {
        let text =
            envelope::extraction_failed(DocumentKind::MedicalReport, FailureKind::EngineFailure);
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert!(value["summary"].is_string());
        assert_eq!(value["testResults"], serde_json::json!([]));
        assert_eq!(value["failure"], "engine_failure");
    }

    #[test]
    fn test_record_status_parse() {
        assert_eq!(
            "failed_fallback".parse::<RecordStatus>().unwrap(),
            RecordStatus::FailedFallback
        );
        assert!("done".parse::<RecordStatus>().is_err());
    }
}
