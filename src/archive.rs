//! Artifact archival by batch verdict.
//!
//! The engine only decides the verdict; moving the intake artifact into
//! its done or failed location is delegated to an archival sink.

use async_trait::async_trait;
use snafu::prelude::*;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::ArchiveConfig;
use crate::error::{
    ArchiveCreateDirSnafu, ArchiveError, ArchiveFileNameSnafu, ArchiveRenameSnafu,
};
use crate::record::BatchVerdict;

/// Moves or labels an intake artifact according to its verdict.
#[async_trait]
pub trait ArchivalSink: Send + Sync {
    async fn archive(&self, artifact: &Path, verdict: BatchVerdict) -> Result<(), ArchiveError>;
}

/// Moves artifacts into sibling done/failed directories.
pub struct DirectoryArchiver {
    done_dir: String,
    failed_dir: String,
}

impl DirectoryArchiver {
    pub fn from_config(config: &ArchiveConfig) -> Self {
        Self {
            done_dir: config.done_dir.clone(),
            failed_dir: config.failed_dir.clone(),
        }
    }

    fn target_dir(&self, artifact: &Path, verdict: BatchVerdict) -> PathBuf {
        let parent = artifact.parent().unwrap_or_else(|| Path::new(""));
        let sub = match verdict {
            BatchVerdict::Archived => &self.done_dir,
            BatchVerdict::Rejected => &self.failed_dir,
        };
        parent.join(sub)
    }
}

#[async_trait]
impl ArchivalSink for DirectoryArchiver {
    async fn archive(&self, artifact: &Path, verdict: BatchVerdict) -> Result<(), ArchiveError> {
        let file_name = artifact.file_name().context(ArchiveFileNameSnafu {
            path: artifact.display().to_string(),
        })?;

        let target_dir = self.target_dir(artifact, verdict);
        tokio::fs::create_dir_all(&target_dir)
            .await
            .context(ArchiveCreateDirSnafu {
                path: target_dir.display().to_string(),
            })?;

        let destination = target_dir.join(file_name);
        tokio::fs::rename(artifact, &destination)
            .await
            .context(ArchiveRenameSnafu {
                path: artifact.display().to_string(),
            })?;

        debug!(
            verdict = verdict.as_str(),
            "Archived {} -> {}",
            artifact.display(),
            destination.display()
        );
        Ok(())
    }
}
