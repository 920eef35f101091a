//! Record admission tracking for idempotent processing.
//!
//! The deduplication store is the only state shared across concurrent
//! record tasks. Admission is a single atomic check-and-set: two
//! concurrent calls for the same identifier never both succeed.

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::{DedupBackend, DedupConfig};

/// Tracks which record identifiers have been admitted.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Atomically record an identifier if unseen.
    ///
    /// Returns true exactly once per identifier over the store's lifetime.
    async fn admit(&self, id: &str) -> bool;
}

/// Process-local admission set.
///
/// Admissions do not survive restarts, giving at-least-once semantics
/// within a run; a durable set can be supplied via the `external` backend.
#[derive(Default)]
pub struct MemoryDedup {
    seen: Mutex<HashSet<String>>,
}

impl MemoryDedup {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DedupStore for MemoryDedup {
    async fn admit(&self, id: &str) -> bool {
        // insert under the lock is the atomic check-and-set
        self.seen.lock().await.insert(id.to_string())
    }
}

/// Build the dedup store selected by configuration.
///
/// Returns `None` for the external backend, which the embedding
/// application must supply itself.
pub fn from_config(config: &DedupConfig) -> Option<Arc<dyn DedupStore>> {
    match config.backend {
        DedupBackend::InMemory => Some(Arc::new(MemoryDedup::new())),
        DedupBackend::External => None,
    }
}
