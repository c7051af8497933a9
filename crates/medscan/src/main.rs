mod cli;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands, PendingCommands, ReportsCommands};

const DEFAULT_LOG_FILTER: &str = "medscan=info,medscan_core=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let app = cli::App::open(cli.db).await?;

    dispatch(cli.command, &app).await
}

async fn dispatch(command: Commands, app: &cli::App) -> Result<()> {
    match command {
        Commands::Scan { file, submitter } => cli::scan::run(app, &file, &submitter).await,
        Commands::Report {
            file,
            report_type,
            date,
            description,
            submitter,
        } => {
            cli::report::run_ingest(
                app,
                &file,
                &report_type,
                date,
                description.as_deref(),
                &submitter,
            )
            .await
        }
        Commands::Scans { submitter } => cli::scan::run_list(app, submitter.as_deref()).await,
        Commands::Reports { command } => match command {
            ReportsCommands::List { submitter } => cli::report::run_list(app, &submitter).await,
            ReportsCommands::Pending => cli::report::run_pending(app).await,
            ReportsCommands::SetStatus { id, status } => {
                cli::report::run_set_status(app, id, &status).await
            }
        },
        Commands::Pending { command } => match command {
            None | Some(PendingCommands::List) => cli::pending::run_list(app).await,
            Some(PendingCommands::Approve {
                brand,
                manufacturer,
            }) => cli::pending::run_approve(app, &brand, &manufacturer).await,
            Some(PendingCommands::Reject {
                brand,
                manufacturer,
            }) => cli::pending::run_reject(app, &brand, &manufacturer).await,
        },
        Commands::Catalog => cli::pending::run_catalog(app).await,
    }
}
