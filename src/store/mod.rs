//! Durable store client interface and a local reference implementation.
//!
//! The engine never assumes the store is idempotent: a retried write may
//! produce a duplicate row, which is the store operator's concern.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::PersistError;
use crate::record::Record;

/// Acknowledgement for a successful durable write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Write sequence number assigned by the store.
    pub sequence: u64,
}

/// Client for the durable record store.
///
/// Implementations classify every failure as transient or terminal; the
/// persistence stage decides retry behavior from that flag alone.
#[async_trait]
pub trait DurableStore: Send + Sync {
    async fn write(&self, record: &Record) -> Result<Ack, PersistError>;
}

/// Append-only newline-delimited JSON store on the local filesystem.
pub struct JsonlStore {
    file: Mutex<File>,
    sequence: AtomicU64,
}

impl JsonlStore {
    /// Open (or create) the store file, creating parent directories.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, std::io::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;

        Ok(Self {
            file: Mutex::new(file),
            sequence: AtomicU64::new(0),
        })
    }
}

fn classify(error: std::io::Error) -> PersistError {
    match error.kind() {
        // A missing or unwritable target will not heal on its own
        ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::InvalidInput => {
            PersistError::Terminal {
                message: error.to_string(),
            }
        }
        _ => PersistError::Transient {
            message: error.to_string(),
        },
    }
}

#[async_trait]
impl DurableStore for JsonlStore {
    async fn write(&self, record: &Record) -> Result<Ack, PersistError> {
        let mut line = serde_json::to_vec(record).map_err(|e| PersistError::Terminal {
            message: e.to_string(),
        })?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line).await.map_err(classify)?;
        file.flush().await.map_err(classify)?;

        Ok(Ack {
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
        })
    }
}
