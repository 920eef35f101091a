//! Durable persistence stage.
//!
//! Wraps the store collaborator with bounded retry of transient failures.
//! A terminal classification or an exhausted budget drops only the record
//! at hand; siblings in the batch are unaffected.

use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::PersistenceConfig;
use crate::emit;
use crate::error::PersistError;
use crate::metrics::events::{PersistCompleted, PersistRetried};
use crate::record::Record;
use crate::stage::StageError;
use crate::stage::retry::{BackoffPolicy, RetryState};
use crate::store::{Ack, DurableStore};

/// Writes records to the durable store with bounded retry.
pub struct PersistStage {
    store: Arc<dyn DurableStore>,
    max_attempts: u32,
    backoff: BackoffPolicy,
}

impl PersistStage {
    pub fn new(store: Arc<dyn DurableStore>, config: &PersistenceConfig) -> Self {
        Self {
            store,
            max_attempts: config.max_attempts,
            backoff: config.backoff,
        }
    }

    /// Write `record` to the durable store, retrying transient failures.
    ///
    /// Cancellation is observed before each attempt and during backoff
    /// sleeps only; an in-flight write is always awaited to completion so
    /// a non-idempotent store never sees a torn attempt.
    pub async fn persist(
        &self,
        record: &Record,
        cancel: &CancellationToken,
    ) -> Result<Ack, StageError<PersistError>> {
        let mut retry = RetryState::new(self.max_attempts);
        let start = Instant::now();

        loop {
            if cancel.is_cancelled() {
                return Err(StageError::Cancelled);
            }
            let attempt = retry.record_attempt();

            match self.store.write(record).await {
                Ok(ack) => {
                    emit!(PersistCompleted {
                        duration: start.elapsed()
                    });
                    return Ok(ack);
                }
                Err(source) if source.is_transient() && !retry.exhausted() => {
                    warn!(
                        id = %record.id,
                        attempt,
                        "Transient store failure, will retry: {source}"
                    );
                    emit!(PersistRetried);

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
