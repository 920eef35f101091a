//! Error types for sleet using snafu.
//!
//! Batch-level structural errors decide the verdict; record-level errors
//! are classified by the collaborator that produced them and resolved
//! locally by the stage that saw them. Only `IngestError` ever reaches
//! the caller.

use snafu::prelude::*;

// ============ Schema Errors ============

/// Errors raised while validating an intake artifact.
///
/// Any of these rejects the whole batch before a single record runs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SchemaError {
    /// Payload could not be parsed as an aggregate document.
    #[snafu(display("Malformed aggregate payload"))]
    Malformed { source: serde_json::Error },

    /// Aggregate parsed but contains no records.
    #[snafu(display("Aggregate contains no records"))]
    EmptyAggregate,

    /// A record is missing its identifier.
    #[snafu(display("Record at index {index} has an empty id"))]
    EmptyRecordId { index: usize },
}

// ============ Persist Errors ============

/// Failure writing a record to the durable store.
///
/// The store client classifies every failure; the persistence stage
/// decides retry behavior from that flag alone.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PersistError {
    /// The write failed but a retry may succeed.
    #[snafu(display("Transient store failure: {message}"))]
    Transient { message: String },

    /// The write failed and retrying will not help.
    #[snafu(display("Terminal store failure: {message}"))]
    Terminal { message: String },
}

impl PersistError {
    pub fn is_transient(&self) -> bool {
        matches!(self, PersistError::Transient { .. })
    }
}

// ============ Process Errors ============

/// Failure invoking the external processing operation.
///
/// Pre-classified by the service client: recoverable failures are expected
/// to clear eventually, non-recoverable ones drop the record immediately.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProcessError {
    #[snafu(display("Recoverable service failure: {message}"))]
    Recoverable { message: String },

    #[snafu(display("Non-recoverable service failure: {message}"))]
    NonRecoverable { message: String },
}

impl ProcessError {
    pub fn is_recoverable(&self) -> bool {
        matches!(self, ProcessError::Recoverable { .. })
    }
}

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Persistence needs at least one write attempt.
    #[snafu(display("persistence.max_attempts must be at least 1"))]
    ZeroPersistAttempts,

    /// Processing needs at least one attempt.
    #[snafu(display("processing.max_attempts must be at least 1"))]
    ZeroProcessAttempts,

    /// The pipeline cannot run zero records at a time.
    #[snafu(display("pipeline.max_concurrent_records must be at least 1"))]
    ZeroConcurrency,

    /// Exponential backoff with a zero base never waits.
    #[snafu(display("backoff base_ms must be at least 1"))]
    ZeroBackoffBase,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML configuration"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file"))]
    ReadConfigFile { source: std::io::Error },

    /// The external dedup backend must be supplied by the embedder.
    #[snafu(display(
        "dedup.backend = external requires an embedding application to supply the store"
    ))]
    ExternalDedup,
}

// ============ Archive Errors ============

/// Errors that can occur while archiving an intake artifact.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
// Prefix is intentional to avoid snafu selector conflicts across enums
pub enum ArchiveError {
    #[snafu(display("Failed to create archive directory {path}"))]
    ArchiveCreateDir {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("Failed to move artifact {path}"))]
    ArchiveRename {
        source: std::io::Error,
        path: String,
    },

    #[snafu(display("Artifact path {path} has no file name"))]
    ArchiveFileName { path: String },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },
}

// ============ Ingest Error (top-level) ============

/// Internal faults that abort a submission or the process.
///
/// Classified record-level failures never surface here; they resolve to
/// `Dropped` outcomes inside the pipeline.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IngestError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Metrics error.
    #[snafu(display("Metrics error"))]
    Metrics { source: MetricsError },

    /// Address parsing error.
    #[snafu(display("Failed to parse address"))]
    AddressParse { source: std::net::AddrParseError },

    /// The bundled store file could not be opened.
    #[snafu(display("Failed to open store at {path}"))]
    StoreInit {
        source: std::io::Error,
        path: String,
    },

    /// The HTTP service client could not be built.
    #[snafu(display("Failed to build HTTP client"))]
    HttpClient { source: reqwest::Error },

    /// An intake artifact could not be read.
    #[snafu(display("Failed to read artifact {path}"))]
    ReadArtifact {
        source: std::io::Error,
        path: String,
    },

    /// Archival error.
    #[snafu(display("Archive error"))]
    Archive { source: ArchiveError },
}
