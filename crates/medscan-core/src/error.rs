use thiserror::Error;

use crate::medicine::MedicineKey;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    #[error("Invalid medicine data: {0}")]
    InvalidMedicine(String),

    #[error("No pending entry for {0}")]
    PendingNotFound(MedicineKey),

    #[error("Record not found: {0}")]
    RecordNotFound(uuid::Uuid),

    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Corrupt row in {table}: {detail}")]
    CorruptRow { table: &'static str, detail: String },

    #[error("Could not settle pending state for {0}")]
    ReconcileConflict(MedicineKey),

    #[error("Upload timed out before assembly")]
    TimedOut,

    #[error("Blob store error: {0}")]
    BlobStore(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
