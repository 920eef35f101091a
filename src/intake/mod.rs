//! Batch intake control.
//!
//! An artifact moves Received -> Validating and then either
//! Splitting -> Dispatched -> archived, or straight to rejected. The
//! verdict is a pure function of structural validity: a troublesome
//! record shows up in the outcome list but can never fail the artifact.

mod validate;

pub use validate::{JsonValidator, SchemaValidator};

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::emit;
use crate::metrics::events::{BatchCompleted, BatchValidated, RecordsDispatched};
use crate::pipeline::RecordPipeline;
use crate::record::{BatchStats, BatchVerdict, ProcessingOutcome};

/// Phases an artifact moves through during intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntakePhase {
    Received,
    Validating,
    Splitting,
    Dispatched,
    Done,
}

impl IntakePhase {
    fn as_str(&self) -> &'static str {
        match self {
            IntakePhase::Received => "received",
            IntakePhase::Validating => "validating",
            IntakePhase::Splitting => "splitting",
            IntakePhase::Dispatched => "dispatched",
            IntakePhase::Done => "done",
        }
    }
}

/// Result of one aggregate submission.
#[derive(Debug)]
pub struct BatchReport {
    pub verdict: BatchVerdict,
    pub outcomes: Vec<ProcessingOutcome>,
    pub stats: BatchStats,
}

/// Validates and splits intake artifacts and dispatches their records.
pub struct IntakeController {
    validator: Arc<dyn SchemaValidator>,
    pipeline: RecordPipeline,
}

impl IntakeController {
    pub fn new(validator: Arc<dyn SchemaValidator>, pipeline: RecordPipeline) -> Self {
        Self {
            validator,
            pipeline,
        }
    }

    /// Submit one aggregate payload and wait for every record to reach a
    /// terminal outcome.
    ///
    /// The verdict is fixed the moment validation finishes; a rejected
    /// artifact produces no record outcomes.
    pub async fn submit(&self, payload: &[u8]) -> BatchReport {
        let start = Instant::now();
        self.enter(IntakePhase::Received);

        self.enter(IntakePhase::Validating);
        let aggregate = match self.validator.validate(payload) {
            Ok(aggregate) => aggregate,
            Err(error) => {
                warn!("Rejecting aggregate: {error}");
                emit!(BatchValidated {
                    verdict: BatchVerdict::Rejected
                });
                emit!(BatchCompleted {
                    duration: start.elapsed()
                });
                return BatchReport {
                    verdict: BatchVerdict::Rejected,
                    outcomes: Vec::new(),
                    stats: BatchStats::default(),
                };
            }
        };
        // Structure is sound; nothing below can change the verdict.
        emit!(BatchValidated {
            verdict: BatchVerdict::Archived
        });

        self.enter(IntakePhase::Splitting);
        let records = aggregate.records;
        info!(records = records.len(), "Dispatching batch");
        emit!(RecordsDispatched {
            count: records.len() as u64
        });

        self.enter(IntakePhase::Dispatched);
        let outcomes = self.pipeline.await_all(records).await;
        let stats = BatchStats::from_outcomes(&outcomes);

        self.enter(IntakePhase::Done);
        info!(
            emitted = stats.emitted,
            duplicates = stats.duplicates,
            dropped = stats.dropped,
            "Batch complete"
        );
        emit!(BatchCompleted {
            duration: start.elapsed()
        });

        BatchReport {
            verdict: BatchVerdict::Archived,
            outcomes,
            stats,
        }
    }

    fn enter(&self, phase: IntakePhase) {
        debug!(phase = phase.as_str(), "Intake phase");
    }
}
