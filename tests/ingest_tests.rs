//! End-to-end tests for the record intake pipeline.
//!
//! Drives real batches through the full controller with scripted
//! fault-injection collaborators.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use sleet::config::Config;
use sleet::dedup::MemoryDedup;
use sleet::error::{PersistError, ProcessError};
use sleet::intake::{IntakeController, JsonValidator};
use sleet::pipeline::RecordPipeline;
use sleet::record::{Aggregate, BatchVerdict, DropReason, ProcessingOutcome, Record};
use sleet::service::{ExternalService, Processed};
use sleet::sink::MemorySink;
use sleet::stage::retry::BackoffPolicy;
use sleet::store::{Ack, DurableStore};

/// Store that succeeds, optionally failing one scripted id first.
struct FlakyStore {
    writes: AtomicU32,
    fail_id: Option<String>,
    failures: AtomicU32,
    terminal: bool,
    delay: Option<Duration>,
}

impl FlakyStore {
    fn reliable() -> Self {
        Self::failing(None, 0, false)
    }

    fn failing(fail_id: Option<&str>, failures: u32, terminal: bool) -> Self {
        Self {
            writes: AtomicU32::new(0),
            fail_id: fail_id.map(String::from),
            failures: AtomicU32::new(failures),
            terminal,
            delay: None,
        }
    }

    fn slow(delay: Duration) -> Self {
        let mut store = Self::reliable();
        store.delay = Some(delay);
        store
    }

    fn writes(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DurableStore for FlakyStore {
    async fn write(&self, record: &Record) -> Result<Ack, PersistError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let sequence = self.writes.fetch_add(1, Ordering::SeqCst) as u64 + 1;

        if self.fail_id.as_deref() == Some(record.id.as_str())
            && self.failures.load(Ordering::SeqCst) > 0
        {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            if self.terminal {
                return Err(PersistError::Terminal {
                    message: "simulated store error".to_string(),
                });
            }
            return Err(PersistError::Transient {
                message: "simulated store error".to_string(),
            });
        }

        Ok(Ack { sequence })
    }
}

/// Service that succeeds, optionally failing one scripted id first.
struct FlakyService {
    calls: AtomicU32,
    fail_id: Option<String>,
    failures: AtomicU32,
    recoverable: bool,
}

impl FlakyService {
    fn reliable() -> Self {
        Self::failing(None, 0, true)
    }

    fn failing(fail_id: Option<&str>, failures: u32, recoverable: bool) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_id: fail_id.map(String::from),
            failures: AtomicU32::new(failures),
            recoverable,
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExternalService for FlakyService {
    async fn invoke(&self, record: &Record) -> Result<Processed, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_id.as_deref() == Some(record.id.as_str())
            && self.failures.load(Ordering::SeqCst) > 0
        {
            self.failures.fetch_sub(1, Ordering::SeqCst);
            if self.recoverable {
                return Err(ProcessError::Recoverable {
                    message: "simulated service error".to_string(),
                });
            }
            return Err(ProcessError::NonRecoverable {
                message: "simulated service error".to_string(),
            });
        }

        Ok(Processed {
            record: record.clone(),
        })
    }
}

struct Harness {
    controller: IntakeController,
    store: Arc<FlakyStore>,
    service: Arc<FlakyService>,
    sink: Arc<MemorySink>,
}

fn harness(config: Config, store: FlakyStore, service: FlakyService) -> Harness {
    let store = Arc::new(store);
    let service = Arc::new(service);
    let sink = Arc::new(MemorySink::new());

    let pipeline = RecordPipeline::new(
        &config,
        Arc::new(MemoryDedup::new()),
        store.clone(),
        service.clone(),
        sink.clone(),
        CancellationToken::new(),
    );

    Harness {
        controller: IntakeController::new(Arc::new(JsonValidator::new()), pipeline),
        store,
        service,
        sink,
    }
}

/// Defaults with millisecond backoff so retry tests stay fast.
fn fast_config() -> Config {
    let mut config = Config::default();
    config.persistence.backoff = BackoffPolicy::Fixed { delay_ms: 1 };
    config.processing.backoff = BackoffPolicy::Fixed { delay_ms: 1 };
    config
}

fn payload(ids: &[&str]) -> Vec<u8> {
    let records = ids
        .iter()
        .map(|id| Record::new(*id, format!("Record number: {id}")))
        .collect();
    serde_json::to_vec(&Aggregate {
        timestamp: Utc::now(),
        records,
    })
    .unwrap()
}

fn emitted_ids(outcomes: &[ProcessingOutcome]) -> Vec<String> {
    let mut ids: Vec<String> = outcomes
        .iter()
        .filter(|o| o.is_emitted())
        .map(|o| o.id().to_string())
        .collect();
    ids.sort();
    ids
}

mod batch_tests {
    use super::*;

    #[tokio::test]
    async fn test_clean_batch_emits_every_record() {
        let h = harness(fast_config(), FlakyStore::reliable(), FlakyService::reliable());
        let ids: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let report = h.controller.submit(&payload(&id_refs)).await;

        assert_eq!(report.verdict, BatchVerdict::Archived);
        assert_eq!(report.stats.records_total, 10);
        assert_eq!(report.stats.emitted, 10);
        assert_eq!(emitted_ids(&report.outcomes), ids);
        assert_eq!(h.sink.delivered().await.len(), 10);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected_without_processing() {
        let h = harness(fast_config(), FlakyStore::reliable(), FlakyService::reliable());

        let report = h.controller.submit(b"definitely not an aggregate").await;

        assert_eq!(report.verdict, BatchVerdict::Rejected);
        assert!(report.outcomes.is_empty());
        assert_eq!(h.store.writes(), 0);
        assert_eq!(h.service.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_aggregate_is_rejected() {
        let h = harness(fast_config(), FlakyStore::reliable(), FlakyService::reliable());

        let report = h.controller.submit(&payload(&[])).await;

        assert_eq!(report.verdict, BatchVerdict::Rejected);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_verdict_ignores_record_failures() {
        // Record "1" fails persistence terminally; the batch still archives
        // and the other nine records all emit.
        let h = harness(
            fast_config(),
            FlakyStore::failing(Some("1"), 3, false),
            FlakyService::reliable(),
        );
        let ids: Vec<String> = (0..10).map(|i| i.to_string()).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let report = h.controller.submit(&payload(&id_refs)).await;

        assert_eq!(report.verdict, BatchVerdict::Archived);
        assert_eq!(report.stats.emitted, 9);
        assert_eq!(report.stats.dropped, 1);

        let dropped: Vec<&ProcessingOutcome> = report
            .outcomes
            .iter()
            .filter(|o| o.drop_reason().is_some())
            .collect();
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].id(), "1");
        assert_eq!(dropped[0].drop_reason(), Some(DropReason::PersistExhausted));

        let expected: Vec<String> = ids.iter().filter(|id| *id != "1").cloned().collect();
        assert_eq!(emitted_ids(&report.outcomes), expected);
    }
}

mod dedup_tests {
    use super::*;

    #[tokio::test]
    async fn test_duplicate_across_batches() {
        let h = harness(fast_config(), FlakyStore::reliable(), FlakyService::reliable());

        let first = h.controller.submit(&payload(&["1"])).await;
        assert_eq!(first.stats.emitted, 1);

        let second = h.controller.submit(&payload(&["1"])).await;
        assert_eq!(second.verdict, BatchVerdict::Archived);
        assert_eq!(second.stats.emitted, 0);
        assert_eq!(second.stats.duplicates, 1);

        // Exactly one write and one emit across both submissions
        assert_eq!(h.store.writes(), 1);
        assert_eq!(h.sink.delivered().await.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_within_batch() {
        let h = harness(fast_config(), FlakyStore::reliable(), FlakyService::reliable());

        let report = h.controller.submit(&payload(&["1", "1"])).await;

        assert_eq!(report.stats.emitted, 1);
        assert_eq!(report.stats.duplicates, 1);
        assert_eq!(h.store.writes(), 1);
    }
}

mod persistence_tests {
    use super::*;

    #[tokio::test]
    async fn test_transient_failures_within_budget_recover() {
        // Two failures against a budget of three total attempts
        let h = harness(
            fast_config(),
            FlakyStore::failing(Some("1"), 2, false),
            FlakyService::reliable(),
        );

        let report = h.controller.submit(&payload(&["1"])).await;

        assert_eq!(report.stats.emitted, 1);
        assert_eq!(h.store.writes(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retry_budget_drops_record() {
        // Three failures exhaust the default budget of three attempts
        let h = harness(
            fast_config(),
            FlakyStore::failing(Some("1"), 3, false),
            FlakyService::reliable(),
        );

        let report = h.controller.submit(&payload(&["1"])).await;

        assert_eq!(report.stats.dropped, 1);
        assert_eq!(
            report.outcomes[0].drop_reason(),
            Some(DropReason::PersistExhausted)
        );
        assert_eq!(h.store.writes(), 3);
        assert_eq!(h.service.calls(), 0);
        assert!(h.sink.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_terminal_failure_drops_without_retry() {
        let h = harness(
            fast_config(),
            FlakyStore::failing(Some("1"), 1, true),
            FlakyService::reliable(),
        );

        let report = h.controller.submit(&payload(&["1"])).await;

        assert_eq!(
            report.outcomes[0].drop_reason(),
            Some(DropReason::PersistExhausted)
        );
        assert_eq!(h.store.writes(), 1);
    }
}

mod processing_tests {
    use super::*;

    #[tokio::test]
    async fn test_non_recoverable_drops_on_first_occurrence() {
        let h = harness(
            fast_config(),
            FlakyStore::reliable(),
            FlakyService::failing(Some("1"), 1, false),
        );

        let report = h.controller.submit(&payload(&["1"])).await;

        assert_eq!(
            report.outcomes[0].drop_reason(),
            Some(DropReason::NonRecoverable)
        );
        assert_eq!(h.service.calls(), 1);
        // Persisted but never emitted
        assert_eq!(h.store.writes(), 1);
        assert!(h.sink.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_recoverable_failure_clears_before_ceiling() {
        let h = harness(
            fast_config(),
            FlakyStore::reliable(),
            FlakyService::failing(Some("1"), 3, true),
        );

        let report = h.controller.submit(&payload(&["1"])).await;

        assert_eq!(report.stats.emitted, 1);
        assert_eq!(h.service.calls(), 4);
    }

    #[tokio::test]
    async fn test_recoverable_exhaustion_drops_record() {
        let mut config = fast_config();
        config.processing.max_attempts = 4;

        let h = harness(
            config,
            FlakyStore::reliable(),
            FlakyService::failing(Some("1"), 10, true),
        );

        let report = h.controller.submit(&payload(&["1"])).await;

        assert_eq!(
            report.outcomes[0].drop_reason(),
            Some(DropReason::ProcessExhausted)
        );
        assert_eq!(h.service.calls(), 4);
        assert!(h.sink.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_failed_record_does_not_disturb_siblings() {
        let h = harness(
            fast_config(),
            FlakyStore::reliable(),
            FlakyService::failing(Some("1"), 1, false),
        );

        let report = h.controller.submit(&payload(&["0", "1", "2"])).await;

        assert_eq!(report.stats.emitted, 2);
        assert_eq!(report.stats.dropped, 1);
        assert_eq!(emitted_ids(&report.outcomes), vec!["0", "2"]);
    }
}

mod cancellation_tests {
    use super::*;

    #[tokio::test]
    async fn test_batch_timeout_cancels_pending_records() {
        let mut config = fast_config();
        config.pipeline.batch_timeout_ms = Some(30);

        let h = harness(
            config,
            FlakyStore::slow(Duration::from_millis(200)),
            FlakyService::reliable(),
        );

        let report = h.controller.submit(&payload(&["0", "1", "2"])).await;

        // The slow writes complete (cancellation never tears an in-flight
        // call) but every record resolves to Cancelled before processing.
        assert_eq!(report.verdict, BatchVerdict::Archived);
        assert_eq!(report.stats.records_total, 3);
        assert_eq!(report.stats.dropped, 3);
        for outcome in &report.outcomes {
            assert_eq!(outcome.drop_reason(), Some(DropReason::Cancelled));
        }
        assert!(h.sink.delivered().await.is_empty());
    }

    #[tokio::test]
    async fn test_batch_without_timeout_runs_to_completion() {
        let h = harness(
            fast_config(),
            FlakyStore::slow(Duration::from_millis(10)),
            FlakyService::reliable(),
        );

        let report = h.controller.submit(&payload(&["0", "1"])).await;
        assert_eq!(report.stats.emitted, 2);
    }
}
