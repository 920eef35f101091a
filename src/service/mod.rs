//! External service client interface and reference implementations.

mod http;

pub use http::HttpService;

use async_trait::async_trait;
use tracing::info;

use crate::error::ProcessError;
use crate::record::Record;

/// Result of successfully processing one record.
#[derive(Debug, Clone)]
pub struct Processed {
    pub record: Record,
}

/// Client for the external processing operation.
///
/// Failures arrive pre-classified: recoverable errors are worth retrying,
/// non-recoverable ones are not.
#[async_trait]
pub trait ExternalService: Send + Sync {
    async fn invoke(&self, record: &Record) -> Result<Processed, ProcessError>;
}

/// Pass-through service that logs each record and succeeds.
///
/// Used by the CLI when no processing endpoint is configured.
pub struct LogService;

#[async_trait]
impl ExternalService for LogService {
    async fn invoke(&self, record: &Record) -> Result<Processed, ProcessError> {
        info!(id = %record.id, "Processed record: {}", record.description);
        Ok(Processed {
            record: record.clone(),
        })
    }
}
