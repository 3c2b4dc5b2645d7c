//! cdp-api - HTTP service for the loan-offer CDP
//!
//! Accepts JSON lead/eligibility/status traffic, multipart CSV bulk
//! uploads, and serves the Moengage/duplicate/unique/error CSV exports.

use anyhow::Result;
use clap::Parser;
use tracing::info;

use cdp_api::{build_router, AppState};
use cdp_common::events::EventBus;

#[derive(Parser, Debug)]
#[command(name = "cdp-api", about = "Loan-offer CDP HTTP service")]
struct Args {
    /// Data root directory (overrides CDP_ROOT and the config file)
    #[arg(long)]
    root: Option<String>,

    /// Bind address
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Bind port
    #[arg(long, default_value_t = 5730)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    // Log build identification immediately after tracing init, before any
    // database delays
    info!(
        "Starting CDP API (cdp-api) v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let args = Args::parse();

    let root = cdp_common::config::resolve_data_root(args.root.as_deref());
    cdp_common::config::ensure_data_root(&root)?;

    let db_path = cdp_common::config::database_path(&root);
    info!("Database path: {}", db_path.display());

    let pool = cdp_common::db::init_database(&db_path).await?;
    info!("Database connection established");

    let event_bus = EventBus::new(100);

    let state = AppState::new(pool, event_bus);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    info!("cdp-api listening on http://{}:{}", args.host, args.port);
    info!("Health check: http://{}:{}/health", args.host, args.port);

    axum::serve(listener, app).await?;

    Ok(())
}
