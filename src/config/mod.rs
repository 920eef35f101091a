//! Configuration parsing and validation.
//!
//! Loads YAML configuration with environment variable interpolation and
//! per-section defaults. Every retry knob the engine honors lives here;
//! the two stages read their own sections and nothing else.

mod vars;

use serde::{Deserialize, Serialize};
use snafu::prelude::*;
use std::path::Path;

use crate::error::{
    ConfigError, EnvInterpolationSnafu, ReadConfigFileSnafu, YamlParseSnafu, ZeroBackoffBaseSnafu,
    ZeroConcurrencySnafu, ZeroPersistAttemptsSnafu, ZeroProcessAttemptsSnafu,
};
use crate::stage::retry::BackoffPolicy;

/// Main configuration structure for the ingest engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Batch orchestration settings (optional).
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Durable persistence stage settings (optional).
    #[serde(default)]
    pub persistence: PersistenceConfig,
    /// External processing stage settings (optional).
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Deduplication store settings (optional).
    #[serde(default)]
    pub dedup: DedupConfig,
    /// Artifact archival locations (optional).
    #[serde(default)]
    pub archive: ArchiveConfig,
    /// Metrics configuration (optional, enabled by default).
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Batch orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Maximum records of one batch in flight at once (default: 16).
    #[serde(default = "default_max_concurrent_records")]
    pub max_concurrent_records: usize,

    /// Cancel records still pending after this many milliseconds.
    /// Unset means batches run to completion.
    #[serde(default)]
    pub batch_timeout_ms: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_records: default_max_concurrent_records(),
            batch_timeout_ms: None,
        }
    }
}

fn default_max_concurrent_records() -> usize {
    16
}

/// Durable persistence stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Total write attempts per record before it is dropped (default: 3,
    /// i.e. two retries after the first failure).
    #[serde(default = "default_persist_max_attempts")]
    pub max_attempts: u32,

    /// Delay schedule between write retries.
    #[serde(default = "default_persist_backoff")]
    pub backoff: BackoffPolicy,

    /// Store file path used by the bundled NDJSON store.
    #[serde(default = "default_store_path")]
    pub path: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_persist_max_attempts(),
            backoff: default_persist_backoff(),
            path: default_store_path(),
        }
    }
}

fn default_persist_max_attempts() -> u32 {
    3
}

fn default_persist_backoff() -> BackoffPolicy {
    BackoffPolicy::Fixed { delay_ms: 100 }
}

fn default_store_path() -> String {
    "data/records.ndjson".to_string()
}

/// External processing stage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Total processing attempts per record before it is dropped
    /// (default: 8). Only recoverable failures consume the budget; a
    /// non-recoverable failure drops the record on first occurrence.
    #[serde(default = "default_process_max_attempts")]
    pub max_attempts: u32,

    /// Delay schedule between processing retries.
    #[serde(default = "default_process_backoff")]
    pub backoff: BackoffPolicy,

    /// Endpoint for the bundled HTTP service client. Unset means the
    /// pass-through log service is used.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Per-request timeout for the HTTP client in seconds (default: 30).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_process_max_attempts(),
            backoff: default_process_backoff(),
            endpoint: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_process_max_attempts() -> u32 {
    8
}

fn default_process_backoff() -> BackoffPolicy {
    BackoffPolicy::Exponential {
        base_ms: 200,
        max_ms: 5_000,
    }
}

fn default_request_timeout_secs() -> u64 {
    30
}

/// Deduplication store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Backing set for admitted record identifiers.
    #[serde(default)]
    pub backend: DedupBackend,
}

/// Backing set for admitted record identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupBackend {
    /// Process-local set; at-least-once semantics across restarts.
    #[default]
    #[serde(rename = "in-memory")]
    InMemory,
    /// Durable set supplied by the embedding application.
    External,
}

/// Artifact archival locations, relative to each artifact's directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory for structurally valid artifacts (default: ".done").
    #[serde(default = "default_done_dir")]
    pub done_dir: String,

    /// Directory for rejected artifacts (default: ".failed").
    #[serde(default = "default_failed_dir")]
    pub failed_dir: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            done_dir: default_done_dir(),
            failed_dir: default_failed_dir(),
        }
    }
}

fn default_done_dir() -> String {
    ".done".to_string()
}

fn default_failed_dir() -> String {
    ".failed".to_string()
}

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Whether metrics collection is enabled (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,

    /// Address to bind the metrics HTTP server (default: "0.0.0.0:9090").
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
            address: default_metrics_address(),
        }
    }
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_file_with_options(path, true)
    }

    /// Load configuration from a YAML file with optional environment
    /// variable interpolation.
    pub fn from_file_with_options(
        path: impl AsRef<Path>,
        interpolate_env: bool,
    ) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).context(ReadConfigFileSnafu)?;

        let content = if interpolate_env {
            match vars::interpolate(&content) {
                Ok(text) => text,
                Err(errors) => {
                    return EnvInterpolationSnafu {
                        message: errors.join("\n"),
                    }
                    .fail();
                }
            }
        } else {
            content
        };

        let config: Config = serde_yaml::from_str(&content).context(YamlParseSnafu)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        ensure!(self.persistence.max_attempts >= 1, ZeroPersistAttemptsSnafu);
        ensure!(self.processing.max_attempts >= 1, ZeroProcessAttemptsSnafu);
        ensure!(
            self.pipeline.max_concurrent_records >= 1,
            ZeroConcurrencySnafu
        );

        for backoff in [&self.persistence.backoff, &self.processing.backoff] {
            if let BackoffPolicy::Exponential { base_ms, .. } = backoff {
                ensure!(*base_ms >= 1, ZeroBackoffBaseSnafu);
            }
        }

        Ok(())
    }
}
