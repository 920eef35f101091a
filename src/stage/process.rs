//! External processing stage.
//!
//! Invokes the external service per record with error-classified retry:
//! non-recoverable failures drop the record on first occurrence,
//! recoverable ones retry with backoff up to the configured ceiling.
//! Retries reuse the already-admitted record; admission happens exactly
//! once upstream.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::ProcessingConfig;
use crate::emit;
use crate::error::ProcessError;
use crate::metrics::events::{ProcessCompleted, ProcessRetried};
use crate::record::Record;
use crate::service::{ExternalService, Processed};
use crate::stage::StageError;
use crate::stage::retry::{BackoffPolicy, RetryState};

/// Runs the external processing operation with classified retry.
pub struct ProcessStage {
    service: Arc<dyn ExternalService>,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl ProcessStage {
    pub fn new(service: Arc<dyn ExternalService>, config: &ProcessingConfig) -> Self {
        Self {
            service,
            max_attempts: config.max_attempts,
            backoff: config.backoff,
        }
    }

    /// Invoke the external operation for `record`.
    ///
    /// Same cancellation discipline as persistence: the token is checked
    /// between attempts and during backoff, never mid-call.
    pub async fn process(
        &self,
        record: &Record,
        cancel: &CancellationToken,
    ) -> Result<Processed, StageError<ProcessError>> {
        let mut retry = RetryState::new(self.max_attempts);
        let start = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            let attempt = retry.record_attempt();

            match self.service.invoke(record).await {
                Ok(processed) => {
                    emit!(ProcessCompleted {
                        duration: start.elapsed()
                    });
                    return Ok(processed);
                }
                Err(source) if source.is_recoverable() && !retry.exhausted() => {
                    warn!(
                        id = %record.id,
                        attempt,
                        "Recoverable service failure, will retry: {source}"
                    );
                    emit!(ProcessRetried);

                    let delay = self.backoff.delay(attempt);
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(StageError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(source) => {
                    return Err(StageError::Failed {
                        source,
                        attempts: retry.attempts(),
                    });
                }
            }
        }
    }
}
