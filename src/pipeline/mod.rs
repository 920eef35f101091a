//! Record pipeline orchestration.
//!
//! Fans the records of one batch out as independent concurrent units of
//! work, each running dedup -> persist -> process -> emit to a terminal
//! outcome. One record's failure never aborts or delays its siblings;
//! the only shared state is the deduplication store.

pub mod signal;

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::Config;
use crate::dedup::DedupStore;
use crate::emit;
use crate::metrics::events::{RecordDropped, RecordDuplicate, RecordEmitted, RecordsInFlight};
use crate::record::{DropReason, ProcessingOutcome, Record};
use crate::service::ExternalService;
use crate::sink::EmitSink;
use crate::stage::{PersistStage, ProcessStage, StageError};
use crate::store::DurableStore;

/// Orchestrates the per-record pipeline for whole batches.
pub struct RecordPipeline {
    dedup: Arc<dyn DedupStore>,
    persist: PersistStage,
    process: ProcessStage,
    emit_sink: Arc<dyn EmitSink>,
    max_concurrent: usize,
    batch_timeout: Option<Duration>,
    shutdown: CancellationToken,
}

impl RecordPipeline {
    pub fn new(
        config: &Config,
        dedup: Arc<dyn DedupStore>,
        store: Arc<dyn DurableStore>,
        service: Arc<dyn ExternalService>,
        emit_sink: Arc<dyn EmitSink>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            dedup,
            persist: PersistStage::new(store, &config.persistence),
            process: ProcessStage::new(service, &config.processing),
            emit_sink,
            max_concurrent: config.pipeline.max_concurrent_records,
            batch_timeout: config.pipeline.batch_timeout_ms.map(Duration::from_millis),
            shutdown,
        }
    }

    /// Drive every record of a batch to a terminal outcome.
    ///
    /// Outcomes arrive in completion order, not submission order. Returns
    /// only once each record has been emitted, deduplicated, or dropped.
    pub async fn await_all(&self, records: Vec<Record>) -> Vec<ProcessingOutcome> {
        let total = records.len();
        let cancel = self.shutdown.child_token();

        // Arm the batch deadline; records still pending when it fires
        // resolve to Dropped(Cancelled).
        let deadline = self.batch_timeout.map(|timeout| {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(
                    "Batch timeout after {}ms, cancelling pending records",
                    timeout.as_millis()
                );
                cancel.cancel();
            })
        });

        let mut pending = stream::iter(
            records
                .into_iter()
                .map(|record| self.run_record(record, cancel.clone())),
        )
        .buffer_unordered(self.max_concurrent.max(1));

        let mut outcomes = Vec::with_capacity(total);
        while let Some(outcome) = pending.next().await {
            outcomes.push(outcome);
            emit!(RecordsInFlight {
                count: total - outcomes.len()
            });
        }

        if let Some(handle) = deadline {
            handle.abort();
        }
        outcomes
    }

    /// Run one record through dedup, persistence, processing, and emit.
    async fn run_record(&self, record: Record, cancel: CancellationToken) -> ProcessingOutcome {
        if cancel.is_cancelled() {
            return self.drop_record(record.id, DropReason::Cancelled);
        }

        if !self.dedup.admit(&record.id).await {
            debug!(id = %record.id, "Duplicate record, skipping");
            emit!(RecordDuplicate);
            return ProcessingOutcome::Duplicate(record.id);
        }

        let ack = match self.persist.persist(&record, &cancel).await {
            Ok(ack) => ack,
            Err(StageError::Cancelled) => {
                return self.drop_record(record.id, DropReason::Cancelled);
            }
            Err(StageError::Failed { source, attempts }) => {
                warn!(id = %record.id, attempts, "Persistence gave up: {source}");
                return self.drop_record(record.id, DropReason::PersistExhausted);
            }
        };
        debug!(id = %record.id, sequence = ack.sequence, "Record persisted");

        let processed = match self.process.process(&record, &cancel).await {
            Ok(processed) => processed,
            Err(StageError::Cancelled) => {
                return self.drop_record(record.id, DropReason::Cancelled);
            }
            Err(StageError::Failed { source, attempts }) => {
                let reason = if source.is_recoverable() {
                    DropReason::ProcessExhausted
                } else {
                    DropReason::NonRecoverable
                };
                warn!(id = %record.id, attempts, "Processing gave up: {source}");
                return self.drop_record(record.id, reason);
            }
        };

        self.emit_sink.deliver(processed.record.clone()).await;
        emit!(RecordEmitted);
        ProcessingOutcome::Emitted(processed.record)
    }

    fn drop_record(&self, id: String, reason: DropReason) -> ProcessingOutcome {
        warn!(id = %id, reason = reason.as_str(), "Record dropped");
        emit!(RecordDropped { reason });
        ProcessingOutcome::Dropped { id, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::dedup::MemoryDedup;
    use crate::error::{PersistError, ProcessError};
    use crate::service::Processed;
    use crate::sink::MemorySink;
    use crate::store::Ack;

    #[derive(Default)]
    struct CountingStore {
        writes: AtomicU32,
    }

    #[async_trait]
    impl DurableStore for CountingStore {
        async fn write(&self, _record: &Record) -> Result<Ack, PersistError> {
            let sequence = self.writes.fetch_add(1, Ordering::SeqCst) as u64 + 1;
            Ok(Ack { sequence })
        }
    }

    struct OkService;

    #[async_trait]
    impl ExternalService for OkService {
        async fn invoke(&self, record: &Record) -> Result<Processed, ProcessError> {
            Ok(Processed {
                record: record.clone(),
            })
        }
    }

    fn pipeline(
        dedup: Arc<MemoryDedup>,
        store: Arc<CountingStore>,
        sink: Arc<MemorySink>,
    ) -> RecordPipeline {
        RecordPipeline::new(
            &Config::default(),
            dedup,
            store,
            Arc::new(OkService),
            sink,
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn test_record_flows_through_to_emit() {
        let dedup = Arc::new(MemoryDedup::new());
        let store = Arc::new(CountingStore::default());
        let sink = Arc::new(MemorySink::new());
        let pipeline = pipeline(dedup, store.clone(), sink.clone());

        let outcomes = pipeline.await_all(vec![Record::new("1", "one")]).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_emitted());
        assert_eq!(store.writes.load(Ordering::SeqCst), 1);
        assert_eq!(sink.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_short_circuits_before_persistence() {
        let dedup = Arc::new(MemoryDedup::new());
        assert!(dedup.admit("1").await);

        let store = Arc::new(CountingStore::default());
        let sink = Arc::new(MemorySink::new());
        let pipeline = pipeline(dedup, store.clone(), sink.clone());

        let outcomes = pipeline.await_all(vec![Record::new("1", "one")]).await;

        assert_eq!(
            outcomes,
            vec![ProcessingOutcome::Duplicate("1".to_string())]
        );
        assert_eq!(store.writes.load(Ordering::SeqCst), 0);
        assert!(sink.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_batch_completes_immediately() {
        let pipeline = pipeline(
            Arc::new(MemoryDedup::new()),
            Arc::new(CountingStore::default()),
            Arc::new(MemorySink::new()),
        );

        let outcomes = pipeline.await_all(Vec::new()).await;
        assert!(outcomes.is_empty());
    }
}
