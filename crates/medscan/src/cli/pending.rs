use anyhow::Result;
use medscan_core::MedicineKey;

use super::{print_json, App};

pub async fn run_list(app: &App) -> Result<()> {
    let queue = app.engine().pending_queue().await?;
    if queue.is_empty() {
        eprintln!("No medicines awaiting verification");
    }
    print_json(&queue)
}

pub async fn run_catalog(app: &App) -> Result<()> {
    let catalog = app.storage.list_catalog().await?;
    print_json(&catalog)
}

pub async fn run_approve(app: &App, brand: &str, manufacturer: &str) -> Result<()> {
    let entry = app
        .engine()
        .approve(&MedicineKey::new(brand, manufacturer))
        .await?;

    eprintln!("Approved {}", entry.key());
    print_json(&entry)
}

pub async fn run_reject(app: &App, brand: &str, manufacturer: &str) -> Result<()> {
    let entry = app
        .engine()
        .reject(&MedicineKey::new(brand, manufacturer))
        .await?;

    eprintln!("Rejected {}", entry.key());
    print_json(&entry)
}
