use std::path::Path;

use anyhow::Result;
use chrono::NaiveDate;
use uuid::Uuid;

use medscan_core::record::REVIEW_PENDING;
use medscan_core::DocumentKind;

use super::{print_json, read_upload, App};

pub async fn run_ingest(
    app: &App,
    file: &Path,
    report_type: &str,
    date: NaiveDate,
    description: Option<&str>,
    submitter: &str,
) -> Result<()> {
    let mut upload = read_upload(file, DocumentKind::MedicalReport, submitter).await?;
    if let Some(description) = description {
        upload = upload.with_description(description);
    }

    let record = app
        .pipeline()?
        .ingest_medical_report(upload, report_type, date)
        .await?;

    eprintln!(
        "Report {} recorded as {} ({})",
        record.body.id, record.body.status, record.review_status
    );
    print_json(&record)
}

pub async fn run_list(app: &App, submitter: &str) -> Result<()> {
    let reports = app.storage.list_reports_by_submitter(submitter).await?;
    print_json(&reports)
}

pub async fn run_pending(app: &App) -> Result<()> {
    let reports = app.storage.list_reports_by_review_status(REVIEW_PENDING).await?;
    print_json(&reports)
}

pub async fn run_set_status(app: &App, id: Uuid, status: &str) -> Result<()> {
    app.storage.update_review_status(id, status).await?;
    eprintln!("Report {id} marked {status}");
    Ok(())
}
