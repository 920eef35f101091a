//! sleet: batch record intake and processing service.
//!
//! Validates aggregate artifacts, fans their records through a durable
//! persistence stage and an external processing stage with independent
//! retry policies, and archives each artifact according to its verdict.

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use sleet::archive::{ArchivalSink, DirectoryArchiver};
use sleet::config::Config;
use sleet::dedup;
use sleet::error::{
    AddressParseSnafu, ArchiveSnafu, ConfigSnafu, ExternalDedupSnafu, IngestError, MetricsSnafu,
    ReadArtifactSnafu, StoreInitSnafu,
};
use sleet::intake::{IntakeController, JsonValidator};
use sleet::pipeline::{RecordPipeline, signal};
use sleet::service::{ExternalService, HttpService, LogService};
use sleet::sink::LogSink;
use sleet::store::JsonlStore;

/// Batch record intake and processing service.
#[derive(Parser, Debug)]
#[command(name = "sleet")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file.
    #[arg(short, long)]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Dry run - validate configuration without processing.
    #[arg(long)]
    dry_run: bool,

    /// Aggregate artifact files to ingest.
    files: Vec<PathBuf>,
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), IngestError> {
    let args = Args::parse();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("sleet starting");

    let config = Config::from_file(&args.config).context(ConfigSnafu)?;

    // Initialize metrics if enabled
    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        sleet::metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    if args.dry_run {
        info!("Dry run mode - validating configuration");
        info!("Store path: {}", config.persistence.path);
        info!("Persist attempts: {}", config.persistence.max_attempts);
        info!("Process attempts: {}", config.processing.max_attempts);
        match &config.processing.endpoint {
            Some(endpoint) => info!("Processing endpoint: {endpoint}"),
            None => info!("Processing endpoint: none (log only)"),
        }
        info!("Configuration is valid");
        return Ok(());
    }

    // Wire up collaborators
    let store = Arc::new(
        JsonlStore::open(&config.persistence.path)
            .await
            .context(StoreInitSnafu {
                path: config.persistence.path.clone(),
            })?,
    );

    let service: Arc<dyn ExternalService> = match &config.processing.endpoint {
        Some(endpoint) => Arc::new(HttpService::new(
            endpoint.as_str(),
            Duration::from_secs(config.processing.request_timeout_secs),
        )?),
        None => Arc::new(LogService),
    };

    let Some(dedup_store) = dedup::from_config(&config.dedup) else {
        return ExternalDedupSnafu.fail().context(ConfigSnafu);
    };

    // Graceful shutdown cancels in-flight batches
    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signal::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    let pipeline = RecordPipeline::new(
        &config,
        dedup_store,
        store,
        service,
        Arc::new(LogSink),
        shutdown,
    );
    let controller = IntakeController::new(Arc::new(JsonValidator::new()), pipeline);
    let archiver = DirectoryArchiver::from_config(&config.archive);

    if args.files.is_empty() {
        info!("No artifacts given, nothing to do");
        return Ok(());
    }

    for path in &args.files {
        let payload = tokio::fs::read(path).await.context(ReadArtifactSnafu {
            path: path.display().to_string(),
        })?;

        let report = controller.submit(&payload).await;
        info!(
            artifact = %path.display(),
            verdict = report.verdict.as_str(),
            emitted = report.stats.emitted,
            duplicates = report.stats.duplicates,
            dropped = report.stats.dropped,
            "Artifact processed"
        );

        archiver
            .archive(path, report.verdict)
            .await
            .context(ArchiveSnafu)?;
    }

    Ok(())
}
