pub mod blob;
pub mod config;
pub mod document;
pub mod error;
pub mod ingest;
pub mod medicine;
pub mod reconcile;
pub mod record;
pub mod storage;

pub use blob::{BlobStore, LocalBlobStore};
pub use config::Config;
pub use document::{
    DocumentKind, ExtractedText, ExtractionStatus, FailureKind, FileFormat, StructuredResult,
    StructuringOrigin, UploadRequest,
};
pub use error::{Error, Result};
pub use ingest::{ExtractionPipeline, ScanOutcome, TextExtractor};
pub use medicine::{
    CatalogEntry, MedicineKey, ParsedMedicine, PendingEntry, VerificationStatus,
};
pub use reconcile::{Reconciliation, ReconciliationEngine};
pub use record::{RecordBody, RecordStatus, ReportRecord, ScanRecord};
pub use storage::Storage;
