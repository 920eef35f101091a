//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which emits the
//! corresponding Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

use crate::record::{BatchVerdict, DropReason};

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when a record completes the full pipeline.
pub struct RecordEmitted;

impl InternalEvent for RecordEmitted {
    fn emit(self) {
        trace!("Record emitted");
        counter!("sleet_records_emitted_total").increment(1);
    }
}

/// Event emitted when an already-admitted identifier is skipped.
pub struct RecordDuplicate;

impl InternalEvent for RecordDuplicate {
    fn emit(self) {
        trace!("Duplicate record skipped");
        counter!("sleet_records_duplicate_total").increment(1);
    }
}

/// Event emitted when a record is terminally dropped.
pub struct RecordDropped {
    pub reason: DropReason,
}

impl InternalEvent for RecordDropped {
    fn emit(self) {
        trace!(reason = self.reason.as_str(), "Record dropped");
        counter!("sleet_records_dropped_total", "reason" => self.reason.as_str()).increment(1);
    }
}

/// Event emitted when a batch's records are handed to the pipeline.
pub struct RecordsDispatched {
    pub count: u64,
}

impl InternalEvent for RecordsDispatched {
    fn emit(self) {
        trace!(count = self.count, "Records dispatched");
        counter!("sleet_records_dispatched_total").increment(self.count);
    }
}

/// Event emitted on each persistence retry.
pub struct PersistRetried;

impl InternalEvent for PersistRetried {
    fn emit(self) {
        trace!("Persist retried");
        counter!("sleet_persist_retries_total").increment(1);
    }
}

/// Event emitted on each processing retry.
pub struct ProcessRetried;

impl InternalEvent for ProcessRetried {
    fn emit(self) {
        trace!("Process retried");
        counter!("sleet_process_retries_total").increment(1);
    }
}

/// Event emitted when a batch passes or fails validation.
pub struct BatchValidated {
    pub verdict: BatchVerdict,
}

impl InternalEvent for BatchValidated {
    fn emit(self) {
        trace!(verdict = self.verdict.as_str(), "Batch validated");
        counter!("sleet_batches_total", "verdict" => self.verdict.as_str()).increment(1);
    }
}

// ============================================================================
// Histogram events for timing
// ============================================================================

/// Event emitted when a record's durable write (including retries) completes.
pub struct PersistCompleted {
    pub duration: Duration,
}

impl InternalEvent for PersistCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Persist completed");
        histogram!("sleet_persist_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a record's external processing completes.
pub struct ProcessCompleted {
    pub duration: Duration,
}

impl InternalEvent for ProcessCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Process completed");
        histogram!("sleet_process_duration_seconds").record(self.duration.as_secs_f64());
    }
}

/// Event emitted when a whole batch reaches its report.
pub struct BatchCompleted {
    pub duration: Duration,
}

impl InternalEvent for BatchCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Batch completed");
        histogram!("sleet_batch_duration_seconds").record(self.duration.as_secs_f64());
    }
}

// ============================================================================
// Gauge events for concurrency
// ============================================================================

/// Event emitted as records of a batch reach terminal outcomes.
pub struct RecordsInFlight {
    pub count: usize,
}

impl InternalEvent for RecordsInFlight {
    fn emit(self) {
        trace!(count = self.count, "Records in flight");
        gauge!("sleet_records_in_flight").set(self.count as f64);
    }
}
