pub mod pending;
pub mod report;
pub mod scan;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use medscan_core::{
    Config, DocumentKind, ExtractionPipeline, ReconciliationEngine, Storage, UploadRequest,
};

#[derive(Parser)]
#[command(
    name = "medscan",
    about = "Medicine label and medical report extraction",
    version
)]
pub struct Cli {
    /// SQLite database path (overrides MEDSCAN_DB)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a medicine label and check it against the catalog
    Scan {
        /// Image (jpg, jpeg, png, webp) or PDF of the label
        file: PathBuf,
        /// Who submitted the scan
        #[arg(long, default_value = "anonymous")]
        submitter: String,
    },
    /// Ingest a medical report
    Report {
        /// Image or PDF of the report
        file: PathBuf,
        /// Report type (e.g. "Blood Test")
        #[arg(long = "type")]
        report_type: String,
        /// Report date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
        /// Free-text description
        #[arg(long)]
        description: Option<String>,
        /// Who submitted the report
        #[arg(long, default_value = "anonymous")]
        submitter: String,
    },
    /// List medicine scan records
    Scans {
        /// Only scans from this submitter
        #[arg(long)]
        submitter: Option<String>,
    },
    /// Medical report records
    Reports {
        #[command(subcommand)]
        command: ReportsCommands,
    },
    /// Medicines awaiting verification
    Pending {
        #[command(subcommand)]
        command: Option<PendingCommands>,
    },
    /// List verified medicines
    Catalog,
}

#[derive(Subcommand)]
pub enum ReportsCommands {
    /// List a submitter's reports
    List {
        /// Submitter reference
        submitter: String,
    },
    /// List reports awaiting review
    Pending,
    /// Change a report's review status
    SetStatus {
        /// Report id
        id: Uuid,
        /// New review status (e.g. "Completed")
        status: String,
    },
}

#[derive(Subcommand)]
pub enum PendingCommands {
    /// List open entries
    List,
    /// Approve an entry and add it to the catalog
    Approve {
        /// Brand name, exactly as queued
        brand: String,
        /// Manufacturer, exactly as queued (may be empty)
        manufacturer: String,
    },
    /// Reject an entry
    Reject {
        /// Brand name, exactly as queued
        brand: String,
        /// Manufacturer, exactly as queued (may be empty)
        manufacturer: String,
    },
}

/// Configuration and storage shared by every command
pub struct App {
    pub config: Config,
    pub storage: Storage,
}

impl App {
    pub async fn open(db: Option<PathBuf>) -> Result<Self> {
        let mut config = Config::from_env();
        if let Some(db) = db {
            config.database_path = db;
        }

        if let Some(parent) = config.database_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
        }

        let storage = Storage::open(&config.database_path.to_string_lossy())
            .await
            .with_context(|| format!("opening {}", config.database_path.display()))?;
        tracing::debug!("Opened database at {}", config.database_path.display());

        Ok(Self { config, storage })
    }

    pub fn pipeline(&self) -> Result<ExtractionPipeline> {
        Ok(ExtractionPipeline::from_config(&self.config, self.storage.clone())?)
    }

    pub fn engine(&self) -> ReconciliationEngine {
        ReconciliationEngine::new(self.storage.clone())
    }
}

/// Read a file from disk into a validated upload
pub async fn read_upload(
    path: &Path,
    kind: DocumentKind,
    submitter: &str,
) -> Result<UploadRequest> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(UploadRequest::new(bytes, &name, kind, submitter)?)
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
