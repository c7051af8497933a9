use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::extractor::TextExtractor;
use super::structuring::{DomainPrompt, Structurer, StructuringClient};
use crate::blob::{BlobStore, LocalBlobStore};
use crate::config::Config;
use crate::document::{DocumentKind, ExtractedText, StructuringOrigin, UploadRequest};
use crate::medicine::ParsedMedicine;
use crate::reconcile::{Reconciliation, ReconciliationEngine};
use crate::record::{envelope, RecordBody, RecordStatus, ReportRecord, ScanRecord};
use crate::record::{REVIEW_COMPLETED, REVIEW_PENDING};
use crate::storage::Storage;
use crate::{Error, Result};

/// Where an upload is in its run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Received,
    Extracting,
    Structuring,
    Assembling,
    Complete,
    FailedFallback,
}

impl IngestState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::Extracting => "EXTRACTING",
            Self::Structuring => "STRUCTURING",
            Self::Assembling => "ASSEMBLING",
            Self::Complete => "COMPLETE",
            Self::FailedFallback => "FAILED_FALLBACK",
        }
    }
}

impl std::fmt::Display for IngestState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<RecordStatus> for IngestState {
    fn from(status: RecordStatus) -> Self {
        match status {
            RecordStatus::Complete => Self::Complete,
            RecordStatus::FailedFallback => Self::FailedFallback,
        }
    }
}

/// A medicine scan record plus, when its payload named a medicine, where
/// that medicine ended up. The record is durable even when reconciliation
/// failed; `reconcile_error` then says why.
#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub record: ScanRecord,
    pub reconciliation: Option<Reconciliation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconcile_error: Option<String>,
}

/// Result of the extraction and structuring stages, ready for assembly
struct Analysis {
    extracted: ExtractedText,
    structured_data: String,
    origin: StructuringOrigin,
    status: RecordStatus,
}

/// Drives one upload through extraction, structuring and assembly.
///
/// Nothing durable happens before assembly: an upload that times out or is
/// dropped earlier leaves no blob and no record. Assembly runs on its own
/// task and always finishes once started.
pub struct ExtractionPipeline {
    extractor: TextExtractor,
    structurer: Arc<dyn Structurer>,
    scan_store: Arc<dyn BlobStore>,
    report_store: Arc<dyn BlobStore>,
    storage: Storage,
    ai_timeout: Duration,
    upload_timeout: Duration,
}

impl ExtractionPipeline {
    pub fn new(
        extractor: TextExtractor,
        structurer: Arc<dyn Structurer>,
        scan_store: Arc<dyn BlobStore>,
        report_store: Arc<dyn BlobStore>,
        storage: Storage,
    ) -> Self {
        let defaults = Config::default();
        Self {
            extractor,
            structurer,
            scan_store,
            report_store,
            storage,
            ai_timeout: defaults.ai_timeout(),
            upload_timeout: defaults.upload_timeout(),
        }
    }

    /// Command-line engines, the HTTP structuring client and local blob
    /// directories as configured
    pub fn from_config(config: &Config, storage: Storage) -> Result<Self> {
        config.validate()?;

        Ok(Self::new(
            TextExtractor::from_config(config),
            Arc::new(StructuringClient::new(config)?),
            Arc::new(LocalBlobStore::new(config.scan_upload_dir())),
            Arc::new(LocalBlobStore::new(config.report_upload_dir())),
            storage,
        )
        .with_timeouts(config.ai_timeout(), config.upload_timeout()))
    }

    #[must_use]
    pub fn with_timeouts(mut self, ai_timeout: Duration, upload_timeout: Duration) -> Self {
        self.ai_timeout = ai_timeout;
        self.upload_timeout = upload_timeout;
        self
    }

    pub async fn ingest_medicine_scan(&self, upload: UploadRequest) -> Result<ScanRecord> {
        expect_kind(&upload, DocumentKind::MedicineScan)?;
        let analysis = self.analyse(&upload, DomainPrompt::MedicineLabel).await?;

        let store = Arc::clone(&self.scan_store);
        let storage = self.storage.clone();

        let record = tokio::spawn(async move {
            let body = assemble(store.as_ref(), &upload, analysis).await?;
            let record = ScanRecord { body };
            if let Err(e) = storage.insert_scan(&record).await {
                discard_blob(store.as_ref(), &record.body.file_locator).await;
                return Err(e);
            }
            Ok::<_, Error>(record)
        })
        .await??;

        log_terminal(&record.body);
        Ok(record)
    }

    pub async fn ingest_medical_report(
        &self,
        upload: UploadRequest,
        report_type: &str,
        report_date: NaiveDate,
    ) -> Result<ReportRecord> {
        expect_kind(&upload, DocumentKind::MedicalReport)?;
        let report_type = report_type.trim();
        if report_type.is_empty() {
            return Err(Error::InvalidUpload("report type is required".into()));
        }

        let prompt = DomainPrompt::MedicalReport {
            report_type: report_type.to_string(),
        };
        let analysis = self.analyse(&upload, prompt).await?;

        let store = Arc::clone(&self.report_store);
        let storage = self.storage.clone();
        let report_type = report_type.to_string();

        let record = tokio::spawn(async move {
            let body = assemble(store.as_ref(), &upload, analysis).await?;
            let review_status = match body.status {
                RecordStatus::Complete => REVIEW_COMPLETED,
                RecordStatus::FailedFallback => REVIEW_PENDING,
            };
            let record = ReportRecord {
                body,
                report_type,
                report_date,
                description: upload.description().map(str::to_string),
                review_status: review_status.to_string(),
            };
            if let Err(e) = storage.insert_report(&record).await {
                discard_blob(store.as_ref(), &record.body.file_locator).await;
                return Err(e);
            }
            Ok::<_, Error>(record)
        })
        .await??;

        log_terminal(&record.body);
        Ok(record)
    }

    /// Ingest a medicine scan and, if the model answered with a usable
    /// medicine, reconcile it against the catalog and pending queue
    pub async fn scan_and_reconcile(
        &self,
        upload: UploadRequest,
        engine: &ReconciliationEngine,
    ) -> Result<ScanOutcome> {
        let record = self.ingest_medicine_scan(upload).await?;

        if record.body.status != RecordStatus::Complete {
            return Ok(ScanOutcome {
                record,
                reconciliation: None,
                reconcile_error: None,
            });
        }

        let reconciled = match ParsedMedicine::from_json(&record.body.structured_data) {
            Ok(parsed) => engine.reconcile(&parsed).await,
            Err(e) => Err(e),
        };

        match reconciled {
            Ok(reconciliation) => Ok(ScanOutcome {
                record,
                reconciliation: Some(reconciliation),
                reconcile_error: None,
            }),
            Err(e) => {
                tracing::warn!("Scan {} not reconciled: {}", record.body.id, e);
                Ok(ScanOutcome {
                    record,
                    reconciliation: None,
                    reconcile_error: Some(e.to_string()),
                })
            }
        }
    }

    async fn analyse(&self, upload: &UploadRequest, prompt: DomainPrompt) -> Result<Analysis> {
        log_state(upload, IngestState::Received);

        tokio::time::timeout(self.upload_timeout, self.run_stages(upload, &prompt))
            .await
            .map_err(|_| {
                tracing::warn!(
                    "{} timed out after {:?} before assembly",
                    upload.filename(),
                    self.upload_timeout
                );
                Error::TimedOut
            })
    }

    async fn run_stages(&self, upload: &UploadRequest, prompt: &DomainPrompt) -> Analysis {
        log_state(upload, IngestState::Extracting);
        let extracted = self
            .extractor
            .extract(upload.bytes(), upload.filename())
            .await;

        if let Some(failure) = extracted.status.failure() {
            tracing::warn!("{}: extraction failed ({})", upload.filename(), failure);
            return Analysis {
                structured_data: envelope::extraction_failed(upload.kind(), failure),
                extracted,
                origin: StructuringOrigin::ExtractionFailed,
                status: RecordStatus::FailedFallback,
            };
        }

        log_state(upload, IngestState::Structuring);
        let structured = self
            .structurer
            .structure(&extracted.text, prompt, self.ai_timeout)
            .await;

        if structured.is_success() {
            Analysis {
                extracted,
                structured_data: structured.text,
                origin: structured.origin,
                status: RecordStatus::Complete,
            }
        } else {
            Analysis {
                extracted,
                structured_data: envelope::structuring_failed(upload.kind(), &structured.text),
                origin: structured.origin,
                status: RecordStatus::FailedFallback,
            }
        }
    }
}

fn expect_kind(upload: &UploadRequest, kind: DocumentKind) -> Result<()> {
    if upload.kind() == kind {
        Ok(())
    } else {
        Err(Error::InvalidUpload(format!(
            "expected a {kind} upload, got {}",
            upload.kind()
        )))
    }
}

/// Store the upload bytes and build the record body around the locator
async fn assemble(
    store: &dyn BlobStore,
    upload: &UploadRequest,
    analysis: Analysis,
) -> Result<RecordBody> {
    log_state(upload, IngestState::Assembling);

    let file_locator = store.put(upload.filename(), upload.bytes()).await?;

    Ok(RecordBody {
        id: Uuid::now_v7(),
        file_locator,
        original_filename: upload.filename().to_string(),
        extracted_text: analysis.extracted.text,
        extraction_status: analysis.extracted.status,
        structured_data: analysis.structured_data,
        structuring_origin: analysis.origin,
        status: analysis.status,
        submitter: upload.submitter().to_string(),
        created_at: Utc::now(),
    })
}

/// Removal failures are logged only
async fn discard_blob(store: &dyn BlobStore, locator: &str) {
    if let Err(e) = store.remove(locator).await {
        tracing::warn!("Orphaned blob {}: {}", locator, e);
    }
}

fn log_state(upload: &UploadRequest, state: IngestState) {
    tracing::debug!("{} ({}) -> {}", upload.filename(), upload.kind(), state);
}

fn log_terminal(body: &RecordBody) {
    tracing::info!(
        "{} -> {} (record {}, {})",
        body.original_filename,
        IngestState::from(body.status),
        body.id,
        body.structuring_origin
    );
}
