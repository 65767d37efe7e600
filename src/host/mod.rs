//! Host engine capabilities
//!
//! The pipeline never touches engine objects directly. It asks a
//! [`PackageImporter`] to materialize archives onto disk and a [`SceneHost`]
//! to place entities, so engine integrations and tests can supply their own.

pub mod fs_importer;
pub mod json_scene;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::Result;

pub use fs_importer::FsPackageImporter;
pub use json_scene::{JsonSceneHost, SceneEntity};

/// Opaque handle to an entity created by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityHandle(pub u64);

/// Tag component linking an entity back to its remote usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTag {
    pub id: String,
    pub name: String,
    pub version: String,
}

/// Materializes a package archive's artifacts onto disk.
#[async_trait]
pub trait PackageImporter: Send + Sync {
    /// Import `archive` and resolve once the host reports completion.
    async fn apply_archive(&self, archive: &Path) -> Result<()>;
}

/// Places and updates entities in the host scene.
pub trait SceneHost: Send + Sync {
    /// Create an entity from a materialized prefab.
    fn instantiate(&self, prefab: &str) -> Result<EntityHandle>;

    fn set_name(&self, entity: EntityHandle, name: &str) -> Result<()>;

    /// Attach the tag, replacing any tag the entity already carries.
    fn attach_tag(&self, entity: EntityHandle, tag: &InstanceTag) -> Result<()>;

    /// Destroy an entity created by `instantiate`.
    fn remove(&self, entity: EntityHandle) -> Result<()>;

    /// Push master data to the entity tagged with `instance_id`.
    fn update_master_data(&self, instance_id: &str, sap_id: &str) -> Result<()>;

    /// Show `image` on the entity tagged with `instance_id`.
    fn apply_image(&self, instance_id: &str, image: &Path) -> Result<()>;
}
