//! Import Orchestrator - sequential scene type import
//!
//! ## Pipeline
//!
//! ```text
//! token → scene type detail → for each usage, one at a time:
//!
//!   Diffing ──(already registered)──────────────────────────────► Skipped
//!      │
//!      ▼
//!   Downloading (package cache) → Materializing (inspect + apply archive)
//!      → Instantiating (scene host) → Registering (reference store)
//! ```
//!
//! Two idempotence layers keep re-runs cheap and duplicate free:
//! 1. a usage whose id is already registered is skipped before any I/O
//! 2. the archive is only applied when one of its declared prefabs is
//!    missing from disk
//!
//! A failing usage is recorded in the [`ImportReport`] and the run moves on
//! to the next one. Only authentication and catalog failures end a run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::archive::ArchiveInspector;
use crate::auth::TokenCache;
use crate::catalog::{CatalogClient, SceneTypeSummary, SmartAssetVersionUsage};
use crate::config::Config;
use crate::error::{Result, SyncError};
use crate::host::{InstanceTag, PackageImporter, SceneHost};
use crate::package_cache::PackageCache;
use crate::references::{LocalInstance, LocalReferenceStore};

// ============================================================================
// Types
// ============================================================================

/// Pipeline state of the usage currently in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportState {
    Idle,
    Diffing,
    Skipped,
    Downloading,
    Materializing,
    Instantiating,
    Registering,
    Finished,
}

/// Progress event broadcast on every state change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportProgress {
    pub scene_type_id: String,
    pub usage_index: usize,
    pub usage_count: usize,
    pub usage_id: Option<String>,
    pub state: ImportState,
}

/// What happened to one usage during a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UsageOutcome {
    /// Instantiated and registered
    Imported {
        prefab: String,
        /// False when the prefab was already on disk and the archive was not reapplied
        applied_archive: bool,
    },
    /// Already registered
    Skipped,
    Failed(SyncError),
}

#[derive(Debug, Clone)]
pub struct UsageReport {
    pub usage_id: String,
    pub instance_name: String,
    pub outcome: UsageOutcome,
}

/// Result of one import run
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub scene_type_id: String,
    pub usages: Vec<UsageReport>,
}

impl ImportReport {
    pub fn imported(&self) -> usize {
        self.count(|o| matches!(o, UsageOutcome::Imported { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, UsageOutcome::Skipped))
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.usages.iter().filter_map(|u| match &u.outcome {
            UsageOutcome::Failed(e) => Some((u.usage_id.as_str(), e)),
            _ => None,
        })
    }

    fn count(&self, pred: impl Fn(&UsageOutcome) -> bool) -> usize {
        self.usages.iter().filter(|u| pred(&u.outcome)).count()
    }
}

/// Result of refreshing existing instances
#[derive(Debug, Clone, Default)]
pub struct RefreshReport {
    pub images_applied: usize,
    pub master_data_updated: usize,
    /// `(scene type or usage id, error)`
    pub failures: Vec<(String, SyncError)>,
}

// ============================================================================
// Import Orchestrator
// ============================================================================

pub struct ImportOrchestrator {
    tokens: Arc<TokenCache>,
    catalog: CatalogClient,
    packages: PackageCache,
    importer: Arc<dyn PackageImporter>,
    scene: Arc<dyn SceneHost>,
    references: Mutex<LocalReferenceStore>,
    running: AtomicBool,
    progress_tx: broadcast::Sender<ImportProgress>,
}

/// Clears the busy flag when a run ends, however it ends.
struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ImportOrchestrator {
    pub fn new(
        tokens: Arc<TokenCache>,
        catalog: CatalogClient,
        packages: PackageCache,
        importer: Arc<dyn PackageImporter>,
        scene: Arc<dyn SceneHost>,
        references: LocalReferenceStore,
    ) -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self {
            tokens,
            catalog,
            packages,
            importer,
            scene,
            references: Mutex::new(references),
            running: AtomicBool::new(false),
            progress_tx,
        }
    }

    /// Wire up the HTTP stack from configuration.
    pub fn from_config(
        config: &Config,
        importer: Arc<dyn PackageImporter>,
        scene: Arc<dyn SceneHost>,
        references: LocalReferenceStore,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api.timeout_secs))
            .build()
            .map_err(|e| SyncError::Config(format!("HTTP client: {}", e)))?;

        let tokens = Arc::new(TokenCache::new(client.clone(), config.credentials.clone()));
        let catalog = CatalogClient::new(client, config.api_base_url());
        let packages = PackageCache::new(config.cache.base_dir.clone(), catalog.clone());

        Ok(Self::new(tokens, catalog, packages, importer, scene, references))
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<ImportProgress> {
        self.progress_tx.subscribe()
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    /// Snapshot of the reference store, for persisting
    pub async fn references(&self) -> LocalReferenceStore {
        self.references.lock().await.clone()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// List scene types available in the catalog
    pub async fn list_scene_types(&self) -> Result<Vec<SceneTypeSummary>> {
        let token = self.tokens.ensure_token().await?;
        self.catalog.list_scene_types(&token).await.map_err(|e| {
            warn!(error = %e, "Failed to list scene types");
            e
        })
    }

    /// Import every usage of a scene type that is not registered yet.
    pub async fn import_scene_type(&self, scene_type: &SceneTypeSummary) -> Result<ImportReport> {
        let _guard = self.begin_run()?;
        let scene_type_id = scene_type.id.as_str();

        self.emit(scene_type_id, 0, 0, None, ImportState::Idle);
        let token = self.tokens.ensure_token().await?;

        self.references
            .lock()
            .await
            .find_or_create(scene_type_id, &scene_type.name);

        let detail = self
            .catalog
            .get_scene_type_detail(&token, scene_type_id)
            .await
            .map_err(|e| {
                warn!(scene_type_id = %scene_type_id, error = %e, "Failed to fetch scene type");
                e
            })?;

        let total = detail.usages.len();
        info!(
            scene_type_id = %scene_type_id,
            name = %scene_type.name,
            usages = total,
            "Importing scene type"
        );

        let mut report = ImportReport {
            scene_type_id: scene_type_id.to_string(),
            usages: Vec::with_capacity(total),
        };

        for (index, usage) in detail.usages.iter().enumerate() {
            let outcome = match self
                .import_usage(scene_type, usage, &token, index, total)
                .await
            {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        usage_id = %usage.id,
                        instance_name = %usage.instance_name,
                        error = %e,
                        "Usage import failed, continuing"
                    );
                    UsageOutcome::Failed(e)
                }
            };

            report.usages.push(UsageReport {
                usage_id: usage.id.clone(),
                instance_name: usage.instance_name.clone(),
                outcome,
            });
        }

        self.emit(scene_type_id, total, total, None, ImportState::Finished);
        info!(
            scene_type_id = %scene_type_id,
            imported = report.imported(),
            skipped = report.skipped(),
            failed = report.failures().count(),
            "Import finished"
        );

        Ok(report)
    }

    async fn import_usage(
        &self,
        scene_type: &SceneTypeSummary,
        usage: &SmartAssetVersionUsage,
        token: &str,
        index: usize,
        total: usize,
    ) -> Result<UsageOutcome> {
        let scene_type_id = scene_type.id.as_str();
        let step = |state| self.emit(scene_type_id, index, total, Some(usage.id.as_str()), state);

        step(ImportState::Diffing);
        let registered = self
            .references
            .lock()
            .await
            .find(scene_type_id)
            .is_some_and(|r| r.has_instance(&usage.id));
        if registered {
            info!(usage_id = %usage.id, "Instance already exists, skipping");
            step(ImportState::Skipped);
            return Ok(UsageOutcome::Skipped);
        }

        step(ImportState::Downloading);
        let binary_id = usage.primary_binary_id();
        if binary_id.is_empty() {
            return Err(SyncError::ArchiveMissing(format!(
                "usage {} has no binary",
                usage.id
            )));
        }
        debug!(usage_id = %usage.id, binary_id = %binary_id, "Resolving package");
        let archive = self.packages.fetch(binary_id, token).await?;
        if !PackageCache::is_available(&archive).await {
            return Err(SyncError::ArchiveMissing(archive.display().to_string()));
        }

        step(ImportState::Materializing);
        let prefabs = inspect(&archive).await?;
        let prefab = match prefabs.as_slice() {
            [single] => single.clone(),
            _ => {
                return Err(SyncError::UnsupportedArchiveShape {
                    path: archive,
                    count: prefabs.len(),
                })
            }
        };

        let applied_archive = if self.packages.prefabs_materialized(&prefabs).await {
            debug!(prefab = %prefab, "Prefab already materialized, not reapplying archive");
            false
        } else {
            info!(archive = %archive.display(), "Applying package");
            self.importer.apply_archive(&archive).await?;
            true
        };

        step(ImportState::Instantiating);
        info!(prefab = %prefab, instance_name = %usage.instance_name, "Instantiating");
        let entity = self.scene.instantiate(&prefab)?;
        let tag = InstanceTag {
            id: usage.id.clone(),
            name: usage.instance_name.clone(),
            version: usage.version.version_label.clone(),
        };
        let labelled = self
            .scene
            .set_name(entity, &usage.instance_name)
            .and_then(|()| self.scene.attach_tag(entity, &tag));
        if let Err(e) = labelled {
            // An untagged entity would never be matched again; drop it.
            if let Err(remove_err) = self.scene.remove(entity) {
                warn!(
                    usage_id = %usage.id,
                    handle = entity.0,
                    error = %remove_err,
                    "Failed to remove unlabelled entity"
                );
            }
            return Err(e);
        }

        step(ImportState::Registering);
        self.references
            .lock()
            .await
            .find_or_create(scene_type_id, &scene_type.name)
            .add_instance(LocalInstance {
                id: tag.id,
                name: tag.name,
                version: tag.version,
            });

        Ok(UsageOutcome::Imported {
            prefab,
            applied_archive,
        })
    }

    /// Push fresh images and master data to every registered instance.
    pub async fn refresh_instances(&self) -> Result<RefreshReport> {
        let _guard = self.begin_run()?;
        let token = self.tokens.ensure_token().await?;

        let targets: Vec<(String, Vec<String>)> = self
            .references
            .lock()
            .await
            .references()
            .iter()
            .map(|r| (r.id.clone(), r.instances.iter().map(|i| i.id.clone()).collect()))
            .collect();

        let mut report = RefreshReport::default();
        for (scene_type_id, instance_ids) in targets {
            let detail = match self.catalog.get_scene_type_detail(&token, &scene_type_id).await {
                Ok(detail) => detail,
                Err(e) => {
                    warn!(scene_type_id = %scene_type_id, error = %e, "Failed to refresh scene type");
                    report.failures.push((scene_type_id, e));
                    continue;
                }
            };

            for usage in detail.usages.iter().filter(|u| instance_ids.contains(&u.id)) {
                if let Some(image_id) = usage.image_id() {
                    let applied = match self.packages.fetch_image(image_id, &token).await {
                        Ok(image) => self.scene.apply_image(&usage.id, &image),
                        Err(e) => Err(e),
                    };
                    match applied {
                        Ok(()) => report.images_applied += 1,
                        Err(e) => {
                            warn!(usage_id = %usage.id, error = %e, "Failed to apply image");
                            report.failures.push((usage.id.clone(), e));
                        }
                    }
                }

                if let Some(sap_id) = usage.sap_id() {
                    match self.scene.update_master_data(&usage.id, sap_id) {
                        Ok(()) => report.master_data_updated += 1,
                        Err(e) => {
                            warn!(usage_id = %usage.id, error = %e, "Failed to update master data");
                            report.failures.push((usage.id.clone(), e));
                        }
                    }
                }
            }
        }

        info!(
            images = report.images_applied,
            master_data = report.master_data_updated,
            failed = report.failures.len(),
            "Refresh finished"
        );
        Ok(report)
    }

    fn begin_run(&self) -> Result<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| SyncError::Busy)?;
        Ok(RunGuard(&self.running))
    }

    fn emit(
        &self,
        scene_type_id: &str,
        usage_index: usize,
        usage_count: usize,
        usage_id: Option<&str>,
        state: ImportState,
    ) {
        let _ = self.progress_tx.send(ImportProgress {
            scene_type_id: scene_type_id.to_string(),
            usage_index,
            usage_count,
            usage_id: usage_id.map(str::to_string),
            state,
        });
    }
}

/// Scan an archive for declared prefabs off the async runtime.
async fn inspect(archive: &Path) -> Result<Vec<String>> {
    let archive: PathBuf = archive.to_path_buf();
    tokio::task::spawn_blocking(move || ArchiveInspector::list_declared_prefabs(&archive))
        .await
        .map_err(|e| SyncError::Archive(format!("inspection task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(outcomes: Vec<UsageOutcome>) -> ImportReport {
        ImportReport {
            scene_type_id: "S1".to_string(),
            usages: outcomes
                .into_iter()
                .enumerate()
                .map(|(i, outcome)| UsageReport {
                    usage_id: i.to_string(),
                    instance_name: format!("instance-{}", i),
                    outcome,
                })
                .collect(),
        }
    }

    #[test]
    fn test_report_counts() {
        let report = report(vec![
            UsageOutcome::Skipped,
            UsageOutcome::Imported {
                prefab: "Chair".to_string(),
                applied_archive: true,
            },
            UsageOutcome::Failed(SyncError::ArchiveMissing("x".to_string())),
            UsageOutcome::Skipped,
        ]);

        assert_eq!(report.imported(), 1);
        assert_eq!(report.skipped(), 2);
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].0, "2");
    }

    #[test]
    fn test_run_guard_releases_flag() {
        let flag = AtomicBool::new(true);
        {
            let _guard = RunGuard(&flag);
        }
        assert!(!flag.load(Ordering::SeqCst));
    }

    #[test]
    fn test_progress_state_serializes_lowercase() {
        let json = serde_json::to_string(&ImportState::Materializing).unwrap();
        assert_eq!(json, "\"materializing\"");
    }
}
