use std::path::Path;

use anyhow::Result;
use medscan_core::{DocumentKind, Reconciliation};

use super::{print_json, read_upload, App};

pub async fn run(app: &App, file: &Path, submitter: &str) -> Result<()> {
    let upload = read_upload(file, DocumentKind::MedicineScan, submitter).await?;
    let pipeline = app.pipeline()?;

    let outcome = pipeline.scan_and_reconcile(upload, &app.engine()).await?;

    match &outcome.reconciliation {
        Some(Reconciliation::Verified(entry)) => {
            eprintln!("Verified: {} ({})", entry.brand_name, entry.manufacturer);
        }
        Some(Reconciliation::AlreadyPending(entry)) => {
            eprintln!("Already awaiting verification: {}", entry.key());
        }
        Some(Reconciliation::Queued(entry)) => {
            eprintln!("Queued for verification: {}", entry.key());
        }
        None => match &outcome.reconcile_error {
            Some(reason) => eprintln!("Scan recorded but not reconciled: {reason}"),
            None => eprintln!("Scan recorded as {}", outcome.record.body.status),
        },
    }

    print_json(&outcome)
}

pub async fn run_list(app: &App, submitter: Option<&str>) -> Result<()> {
    let scans = app.storage.list_scans(submitter).await?;
    print_json(&scans)
}
