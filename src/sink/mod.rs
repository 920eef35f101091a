//! Emit sink for records that complete the pipeline.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::record::Record;

/// Downstream consumer of emitted records.
///
/// Records arrive in completion order; there is no cross-record ordering
/// guarantee.
#[async_trait]
pub trait EmitSink: Send + Sync {
    async fn deliver(&self, record: Record);
}

/// Sink that logs each emitted record.
pub struct LogSink;

#[async_trait]
impl EmitSink for LogSink {
    async fn deliver(&self, record: Record) {
        info!(id = %record.id, "Emitted record");
    }
}

/// Sink that buffers emitted records in memory.
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<Vec<Record>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything delivered so far.
    pub async fn delivered(&self) -> Vec<Record> {
        self.records.lock().await.clone()
    }

    /// Take all delivered records, clearing the buffer.
    pub async fn drain(&self) -> Vec<Record> {
        std::mem::take(&mut *self.records.lock().await)
    }
}

#[async_trait]
impl EmitSink for MemorySink {
    async fn deliver(&self, record: Record) {
        self.records.lock().await.push(record);
    }
}
