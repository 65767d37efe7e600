//! Filesystem package importer
//!
//! Extracts declared prefabs into the cache's `Prefabs/` directory. The
//! extraction runs on a blocking thread and reports back over a oneshot
//! channel, which is the single completion notification the pipeline waits on.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::oneshot;
use tracing::{info, warn};

use super::PackageImporter;
use crate::archive::ArchiveInspector;
use crate::error::{Result, SyncError};

pub struct FsPackageImporter {
    prefab_dir: PathBuf,
}

impl FsPackageImporter {
    pub fn new(prefab_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefab_dir: prefab_dir.into(),
        }
    }
}

#[async_trait]
impl PackageImporter for FsPackageImporter {
    async fn apply_archive(&self, archive: &Path) -> Result<()> {
        let (done_tx, done_rx) = oneshot::channel();
        let archive = archive.to_path_buf();
        let prefab_dir = self.prefab_dir.clone();

        info!(archive = %archive.display(), "Importing package");
        tokio::task::spawn_blocking(move || {
            let result = ArchiveInspector::extract_declared_prefabs(&archive, &prefab_dir);
            if done_tx.send(result).is_err() {
                warn!(archive = %archive.display(), "Import finished after caller went away");
            }
        });

        let written = done_rx
            .await
            .map_err(|_| SyncError::Host("package import task ended without completing".to_string()))??;
        info!(prefabs = written.len(), "Package import completed");
        Ok(())
    }
}
