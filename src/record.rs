//! Core data types flowing through the intake pipeline.
//!
//! Records are created by batch splitting, carried through the pipeline,
//! and resolve to exactly one terminal [`ProcessingOutcome`]. The batch
//! verdict is tracked separately and never depends on record outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single unit of work, identified by a globally unique id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub description: String,
}

impl Record {
    /// Create a record stamped with the current time.
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: Utc::now(),
            description: description.into(),
        }
    }
}

/// One intake artifact: a batch timestamp plus its records.
///
/// Exists only during validation and splitting; afterwards the records
/// travel alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub timestamp: DateTime<Utc>,
    pub records: Vec<Record>,
}

/// Reason a record was terminally dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// The persistence stage gave up, either on a terminal store error or
    /// after exhausting the write retry budget.
    PersistExhausted,
    /// The external service classified the failure as not worth retrying.
    NonRecoverable,
    /// Recoverable processing failures did not clear before the ceiling.
    ProcessExhausted,
    /// The batch was cancelled before this record finished. The record may
    /// already have been admitted to the dedup store.
    Cancelled,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::PersistExhausted => "persist_exhausted",
            DropReason::NonRecoverable => "non_recoverable",
            DropReason::ProcessExhausted => "process_exhausted",
            DropReason::Cancelled => "cancelled",
        }
    }
}

/// Terminal outcome of one record's trip through the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingOutcome {
    /// The record was persisted, processed, and delivered downstream.
    Emitted(Record),
    /// The identifier had already been admitted; nothing else ran.
    Duplicate(String),
    /// The record was terminally dropped by one of the stages.
    Dropped { id: String, reason: DropReason },
}

impl ProcessingOutcome {
    /// The identifier this outcome belongs to.
    pub fn id(&self) -> &str {
        match self {
            ProcessingOutcome::Emitted(record) => &record.id,
            ProcessingOutcome::Duplicate(id) => id,
            ProcessingOutcome::Dropped { id, .. } => id,
        }
    }

    pub fn is_emitted(&self) -> bool {
        matches!(self, ProcessingOutcome::Emitted(_))
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        match self {
            ProcessingOutcome::Dropped { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}

/// Archival disposition of a whole intake artifact.
///
/// Decided by structural validity alone; record-level failures never
/// change it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchVerdict {
    Archived,
    Rejected,
}

impl BatchVerdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchVerdict::Archived => "archived",
            BatchVerdict::Rejected => "rejected",
        }
    }

    pub fn is_archived(&self) -> bool {
        matches!(self, BatchVerdict::Archived)
    }
}

/// Per-batch outcome tallies.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub records_total: usize,
    pub emitted: usize,
    pub duplicates: usize,
    pub dropped: usize,
}

impl BatchStats {
    /// Fold one outcome into the tallies.
    pub fn observe(&mut self, outcome: &ProcessingOutcome) {
        self.records_total += 1;
        match outcome {
            ProcessingOutcome::Emitted(_) => self.emitted += 1,
            ProcessingOutcome::Duplicate(_) => self.duplicates += 1,
            ProcessingOutcome::Dropped { .. } => self.dropped += 1,
        }
    }

    pub fn from_outcomes(outcomes: &[ProcessingOutcome]) -> Self {
        let mut stats = Self::default();
        for outcome in outcomes {
            stats.observe(outcome);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_id() {
        let emitted = ProcessingOutcome::Emitted(Record::new("a", "first"));
        let duplicate = ProcessingOutcome::Duplicate("b".to_string());
        let dropped = ProcessingOutcome::Dropped {
            id: "c".to_string(),
            reason: DropReason::Cancelled,
        };

        assert_eq!(emitted.id(), "a");
        assert_eq!(duplicate.id(), "b");
        assert_eq!(dropped.id(), "c");
        assert!(emitted.is_emitted());
        assert_eq!(dropped.drop_reason(), Some(DropReason::Cancelled));
        assert_eq!(duplicate.drop_reason(), None);
    }

    #[test]
    fn test_batch_stats_tallies() {
        let outcomes = vec![
            ProcessingOutcome::Emitted(Record::new("0", "zero")),
            ProcessingOutcome::Emitted(Record::new("1", "one")),
            ProcessingOutcome::Duplicate("0".to_string()),
            ProcessingOutcome::Dropped {
                id: "2".to_string(),
                reason: DropReason::PersistExhausted,
            },
        ];

        let stats = BatchStats::from_outcomes(&outcomes);
        assert_eq!(stats.records_total, 4);
        assert_eq!(stats.emitted, 2);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_record_serialization_round_trip() {
        let record = Record::new("42", "Record number: 42");
        let json = serde_json::to_string(&record).unwrap();
        let parsed: Record = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn test_drop_reason_labels() {
        assert_eq!(DropReason::PersistExhausted.as_str(), "persist_exhausted");
        assert_eq!(DropReason::Cancelled.as_str(), "cancelled");
        assert_eq!(BatchVerdict::Archived.as_str(), "archived");
        assert!(BatchVerdict::Archived.is_archived());
        assert!(!BatchVerdict::Rejected.is_archived());
    }
}
