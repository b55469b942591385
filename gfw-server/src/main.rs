//! # gfw
//!
//! Multi-tenant directory ingestion daemon.
//!
//! Without a maintenance flag the binary serves: it reconciles every tenant's
//! watch and destination directories against the record store, then watches
//! for new files until SIGINT or SIGTERM. The maintenance flags list, delete
//! or recopy processed records and exit.

mod output;
mod service;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::Parser;
use gfw_config::{Config, ConfigLoader, DEFAULT_CONFIG_PATH};
use gfw_core::scan::cancel_on_signal;
use gfw_core::{
    BatchReport, RecordQuery, RecordRepository, SqliteRecordStore, Supervisor,
    WatcherOptions, delete_processed, parse_ids, recopy_processed,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use service::ServiceUnit;

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "gfw", version)]
#[command(
    about = "Watch tenant directories, copy settled files once, and keep a record of every copy"
)]
struct Cli {
    /// Path to the YAML configuration file
    #[arg(long, env = "GFW_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Record store location (overrides config)
    #[arg(long, env = "GFW_DATABASE")]
    database: Option<PathBuf>,

    /// List processed files from the database and exit
    #[arg(long)]
    list_processed: bool,

    /// Tenant name: filters listings, required for delete and recopy
    #[arg(long)]
    tenant: Option<String>,

    /// Keep the source file after copying (do not delete original)
    #[arg(short = 'k', long)]
    keep_source: bool,

    /// Delete processed files by comma-separated IDs (use with --tenant)
    #[arg(long, value_name = "IDS")]
    delete_processed: Option<String>,

    /// Recopy processed files by comma-separated IDs (use with --tenant)
    #[arg(long, value_name = "IDS")]
    recopy: Option<String>,

    /// Page number for processed files listing
    #[arg(long, default_value_t = 1, allow_negative_numbers = true)]
    page: i64,

    /// Number of records per page
    #[arg(long, default_value_t = 20, value_parser = clap::value_parser!(i64).range(0..))]
    page_size: i64,

    /// Install and start the systemd service, then exit
    #[arg(long)]
    install_service: bool,
}

#[derive(Debug, PartialEq, Eq)]
enum Mode {
    InstallService,
    Delete(String),
    Recopy(String),
    List,
    Serve,
}

impl Cli {
    fn mode(&self) -> Mode {
        if self.install_service {
            Mode::InstallService
        } else if let Some(ids) = &self.delete_processed {
            Mode::Delete(ids.clone())
        } else if let Some(ids) = &self.recopy {
            Mode::Recopy(ids.clone())
        } else if self.list_processed {
            Mode::List
        } else {
            Mode::Serve
        }
    }

    fn tenant(&self) -> &str {
        self.tenant.as_deref().unwrap_or_default()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mode = cli.mode();
    if mode == Mode::InstallService {
        let unit = ServiceUnit::for_current_process()?;
        service::install(&unit).await?;
        println!("systemd service installed and started");
        return Ok(());
    }

    let load = ConfigLoader::new()
        .with_config_path(&cli.config)
        .load()
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    let config = load.config;

    let db_path = cli
        .database
        .clone()
        .unwrap_or_else(|| config.database.path.clone());
    let store = SqliteRecordStore::open(&db_path)
        .await
        .with_context(|| format!("failed to open record store {}", db_path.display()))?;

    let result = match mode {
        Mode::Delete(raw) => {
            let ids = parse_ids(&raw)?;
            let report = delete_processed(&store, cli.tenant(), &ids).await?;
            finish_batch("delete", &report)
        }
        Mode::Recopy(raw) => {
            let ids = parse_ids(&raw)?;
            let report = recopy_processed(&store, cli.tenant(), &ids).await?;
            finish_batch("recopy", &report)
        }
        Mode::List => list(&store, &cli).await,
        Mode::Serve => serve(&store, &config, cli.keep_source).await,
        Mode::InstallService => Ok(()),
    };

    store.close().await;
    result
}

async fn list(store: &dyn RecordRepository, cli: &Cli) -> anyhow::Result<()> {
    let query = RecordQuery::new(cli.tenant.clone(), cli.page, cli.page_size);
    let records = store
        .query(&query)
        .await
        .context("failed to list processed files")?;
    output::print_listing(&records, cli.page, cli.page_size);
    Ok(())
}

fn finish_batch(operation: &str, report: &BatchReport) -> anyhow::Result<()> {
    for (id, reason) in &report.failed {
        eprintln!("{operation} {id}: {reason}");
    }
    info!(
        operation,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "batch finished"
    );
    if !report.is_clean() {
        let total = report.failed.len() + report.succeeded.len();
        bail!("{operation} failed for {} of {total} ids", report.failed.len());
    }
    Ok(())
}

async fn serve(
    store: &SqliteRecordStore,
    config: &Config,
    keep_source: bool,
) -> anyhow::Result<()> {
    if config.tenants.is_empty() {
        warn!("no tenants configured; nothing to watch");
    }

    let options = WatcherOptions {
        keep_source,
        stability: config.stability.into(),
        ..WatcherOptions::default()
    };
    let supervisor = Supervisor::new(
        Arc::new(store.clone()),
        config.tenants.clone(),
        options,
    );
    let signals = cancel_on_signal(supervisor.shutdown_token());

    let outcome = supervisor.run().await;
    signals.abort();
    outcome.context("failed to start tenant watchers")?;
    info!("shutdown complete");
    Ok(())
}
