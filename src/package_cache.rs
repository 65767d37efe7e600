//! On-disk package cache
//!
//! ```text
//! <base_dir>/
//! ├── Packages/<binaryId>.unitypackage   # downloaded archives
//! ├── Prefabs/<name>.prefab              # written by the package importer
//! └── Images/<imageId>.png               # preview images
//! ```
//!
//! A file at the expected path is a cache hit. Nothing is checksummed.

use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::catalog::CatalogClient;
use crate::error::Result;

pub const PACKAGES_DIR: &str = "Packages";
pub const PREFABS_DIR: &str = "Prefabs";
pub const IMAGES_DIR: &str = "Images";

pub struct PackageCache {
    base_dir: PathBuf,
    catalog: CatalogClient,
}

impl PackageCache {
    pub fn new(base_dir: impl Into<PathBuf>, catalog: CatalogClient) -> Self {
        Self {
            base_dir: base_dir.into(),
            catalog,
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn package_path(&self, binary_id: &str) -> PathBuf {
        self.base_dir
            .join(PACKAGES_DIR)
            .join(format!("{}.unitypackage", binary_id))
    }

    pub fn prefab_dir(&self) -> PathBuf {
        self.base_dir.join(PREFABS_DIR)
    }

    pub fn prefab_path(&self, name: &str) -> PathBuf {
        self.prefab_dir().join(format!("{}.prefab", name))
    }

    pub fn image_path(&self, image_id: &str) -> PathBuf {
        self.base_dir.join(IMAGES_DIR).join(format!("{}.png", image_id))
    }

    /// Local path of a package, downloading it on a cache miss.
    ///
    /// An empty `binary_id` never downloads; the nominal path is returned and
    /// the caller must check [`PackageCache::is_available`] before reading it.
    pub async fn fetch(&self, binary_id: &str, token: &str) -> Result<PathBuf> {
        let path = self.package_path(binary_id);

        if fs::metadata(&path).await.is_ok() {
            debug!(binary_id = %binary_id, path = %path.display(), "Package cache hit");
            return Ok(path);
        }

        if binary_id.is_empty() {
            debug!("No binary id, skipping download");
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        info!(binary_id = %binary_id, "Package cache miss, downloading");
        self.catalog.download_binary(token, binary_id, &path).await?;
        Ok(path)
    }

    /// Local path of a preview image, downloading it on a cache miss.
    pub async fn fetch_image(&self, image_id: &str, token: &str) -> Result<PathBuf> {
        let path = self.image_path(image_id);

        if fs::metadata(&path).await.is_ok() {
            debug!(image_id = %image_id, "Image cache hit");
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        self.catalog.download_image(token, image_id, &path).await?;
        Ok(path)
    }

    /// True when a readable, non-empty file exists at `path`.
    pub async fn is_available(path: &Path) -> bool {
        match fs::metadata(path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        }
    }

    /// True when every named prefab is already on disk.
    pub async fn prefabs_materialized(&self, names: &[String]) -> bool {
        for name in names {
            if fs::metadata(self.prefab_path(name)).await.is_err() {
                return false;
            }
        }
        true
    }
}
