//! Smart Asset Sync - scene type import pipeline
//!
//! Pulls "scene type" manifests from the Smart Asset Cloud catalog and brings
//! the packaged assets they reference into a local scene, exactly once per
//! remote usage.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐
//! │  TokenCache  │────▶│ CatalogClient │
//! └──────────────┘     └───────┬───────┘
//!                              │ detail / blobs
//!                              ▼
//! ┌────────────────────────────────────────────────┐
//! │              ImportOrchestrator                │
//! │  diff → fetch → inspect → apply → instantiate  │
//! └──┬──────────────┬──────────────┬───────────┬───┘
//!    ▼              ▼              ▼           ▼
//! LocalReference  PackageCache  ArchiveInspector  host::{PackageImporter, SceneHost}
//! Store
//! ```
//!
//! ## Cache Layout
//!
//! ```text
//! <base_dir>/
//! ├── Packages/<binaryId>.unitypackage
//! ├── Prefabs/<name>.prefab
//! ├── Images/<imageId>.png
//! ├── references.json
//! └── scene.json              # headless host only
//! ```

pub mod archive;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod package_cache;
pub mod references;

pub use archive::ArchiveInspector;
pub use auth::{AccessToken, TokenCache};
pub use catalog::{CatalogClient, SceneTypeDetail, SceneTypeSummary, SmartAssetVersionUsage};
pub use config::{Config, Credentials};
pub use error::{Result, SyncError};
pub use host::{EntityHandle, InstanceTag, PackageImporter, SceneHost};
pub use orchestrator::{
    ImportOrchestrator, ImportProgress, ImportReport, ImportState, RefreshReport, UsageOutcome,
};
pub use package_cache::PackageCache;
pub use references::{LocalInstance, LocalReference, LocalReferenceStore};
