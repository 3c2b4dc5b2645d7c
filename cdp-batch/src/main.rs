//! cdp-batch - batch CLI for the loan-offer CDP
//!
//! The cron-style entry point: CSV file ingestion, CSV exports to disk,
//! and the retention purge.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};

use cdp_common::events::EventBus;
use cdp_common::export::{self, ExportKind};
use cdp_common::ingest;
use cdp_common::retention::{self, RetentionOverrides};

#[derive(Parser, Debug)]
#[command(name = "cdp-batch", about = "Loan-offer CDP batch jobs")]
struct Cli {
    /// Data root directory (overrides CDP_ROOT and the config file)
    #[arg(long)]
    root: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest a CSV file of customer + offer records
    Ingest {
        /// CSV file to ingest
        #[arg(long)]
        file: PathBuf,

        /// Source label recorded in the ingestion log
        #[arg(long, default_value = "batch")]
        source: String,
    },

    /// Write one CSV export to an output directory
    Export {
        /// Which export to produce
        #[arg(long, value_enum)]
        kind: ExportArg,

        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,

        /// Ingestion log id (required for --kind errors)
        #[arg(long)]
        log_id: Option<i64>,
    },

    /// Purge aged-out offers, events and ingestion logs
    Retention {
        /// Override for terminal-offer retention (days)
        #[arg(long)]
        offer_days: Option<i64>,

        /// Override for campaign-event retention (days)
        #[arg(long)]
        event_days: Option<i64>,

        /// Override for ingestion-log retention (days)
        #[arg(long)]
        log_days: Option<i64>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ExportArg {
    Moengage,
    Duplicates,
    Unique,
    Errors,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let root = cdp_common::config::resolve_data_root(cli.root.as_deref());
    cdp_common::config::ensure_data_root(&root)?;

    let db_path = cdp_common::config::database_path(&root);
    info!("Database path: {}", db_path.display());
    let pool = cdp_common::db::init_database(&db_path).await?;

    match cli.command {
        Command::Ingest { file, source } => {
            let bus = EventBus::new(100);
            let summary = ingest::ingest_csv_file(&pool, &bus, &source, &file).await?;

            println!(
                "Ingested {}: {} rows, {} success, {} duplicate, {} rejected, {} errors (log id {})",
                file.display(),
                summary.total,
                summary.success,
                summary.duplicates,
                summary.rejected,
                summary.errors.len(),
                summary.log_id
            );
            for row_error in &summary.errors {
                error!("Row {}: {}", row_error.row, row_error.message);
            }

            // Nothing landed at all: signal the scheduler
            if summary.total > 0 && summary.errors.len() == summary.total {
                return Ok(ExitCode::FAILURE);
            }
        }

        Command::Export { kind, out, log_id } => match kind {
            ExportArg::Moengage | ExportArg::Duplicates | ExportArg::Unique => {
                let kind = match kind {
                    ExportArg::Moengage => ExportKind::Moengage,
                    ExportArg::Duplicates => ExportKind::Duplicates,
                    ExportArg::Unique => ExportKind::Unique,
                    ExportArg::Errors => unreachable!(),
                };
                let (path, count) = export::export_to_file(&pool, kind, &out).await?;
                println!("Wrote {} rows to {}", count, path.display());
            }
            ExportArg::Errors => {
                let log_id = log_id
                    .ok_or_else(|| anyhow::anyhow!("--log-id is required with --kind errors"))?;
                std::fs::create_dir_all(&out)?;
                let path = out.join(format!("error_report_{}.csv", log_id));
                let file = std::fs::File::create(&path)?;
                let count = export::write_error_report(&pool, file, log_id).await?;
                println!("Wrote {} rows to {}", count, path.display());
            }
        },

        Command::Retention {
            offer_days,
            event_days,
            log_days,
        } => {
            let summary = retention::run_retention(
                &pool,
                RetentionOverrides {
                    offer_days,
                    event_days,
                    log_days,
                },
            )
            .await?;

            println!(
                "Retention: {} offers, {} events, {} logs deleted",
                summary.offers_deleted, summary.events_deleted, summary.logs_deleted
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}
