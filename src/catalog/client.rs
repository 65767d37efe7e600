//! HTTP client for the Smart Asset catalog API

use futures::StreamExt;
use reqwest::{header, Client, StatusCode};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use super::types::{SceneTypeDetail, SceneTypeList, SceneTypeSummary};
use crate::error::{Result, SyncError};

/// Expansion applied to scene type detail requests so usages, versions and
/// binaries come back in a single round trip.
pub const DETAIL_EXPAND: &str =
    "SmartAssetVersionUsages($expand=SmartAssetVersion($expand=Binaries))";

/// Typed client for the catalog API
///
/// Every call is a single attempt; there is no retry.
#[derive(Clone)]
pub struct CatalogClient {
    client: Client,
    base_url: String,
}

impl CatalogClient {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ==================== Catalog ====================

    /// List all scene types
    pub async fn list_scene_types(&self, token: &str) -> Result<Vec<SceneTypeSummary>> {
        let url = format!("{}/vr-client/SceneType", self.base_url);
        let list: SceneTypeList = self.get_json(&url, token).await?;
        Ok(list.value)
    }

    /// Fetch a scene type with its usages expanded down to binaries
    pub async fn get_scene_type_detail(&self, token: &str, id: &str) -> Result<SceneTypeDetail> {
        let url = format!(
            "{}/vr-client/SceneType({})?$expand={}",
            self.base_url,
            urlencoding::encode(id),
            DETAIL_EXPAND
        );
        self.get_json(&url, token).await
    }

    // ==================== Blobs ====================

    pub fn binary_url(&self, binary_id: &str) -> String {
        format!(
            "{}/v2/smart-assets/SmartAssetVersionBinary(guid'{}')/Data",
            self.base_url,
            urlencoding::encode(binary_id)
        )
    }

    pub fn image_url(&self, image_id: &str) -> String {
        format!(
            "{}/v2/smart-assets/SmartAssetVersionImage(guid'{}')/Data",
            self.base_url,
            urlencoding::encode(image_id)
        )
    }

    /// Download a package binary to `dest`
    pub async fn download_binary(&self, token: &str, binary_id: &str, dest: &Path) -> Result<u64> {
        self.download_to(&self.binary_url(binary_id), token, dest).await
    }

    /// Download a preview image to `dest`
    pub async fn download_image(&self, token: &str, image_id: &str, dest: &Path) -> Result<u64> {
        self.download_to(&self.image_url(image_id), token, dest).await
    }

    // ==================== Helper Methods ====================

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, token: &str) -> Result<T> {
        debug!(url = %url, "GET");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| SyncError::RemoteFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::RemoteFetch(
                status_message(response.status(), response).await,
            ));
        }

        response
            .json()
            .await
            .map_err(|e| SyncError::RemoteFetch(e.to_string()))
    }

    /// Stream a response body into `dest`.
    ///
    /// The body is written to `<dest>.download` and renamed on success, so a
    /// failed transfer never leaves a file at `dest`.
    async fn download_to(&self, url: &str, token: &str, dest: &Path) -> Result<u64> {
        info!(url = %url, dest = %dest.display(), "Downloading");

        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| SyncError::Download(e.to_string()))?;

        if !response.status().is_success() {
            return Err(SyncError::Download(
                status_message(response.status(), response).await,
            ));
        }

        let partial = partial_path(dest);
        let written = match write_stream(response, &partial).await {
            Ok(n) => n,
            Err(e) => {
                tokio::fs::remove_file(&partial).await.ok();
                return Err(e);
            }
        };

        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| SyncError::Download(format!("rename {}: {}", partial.display(), e)))?;

        info!(dest = %dest.display(), bytes = written, "Download complete");
        Ok(written)
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".download");
    PathBuf::from(name)
}

async fn write_stream(response: reqwest::Response, path: &Path) -> Result<u64> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| SyncError::Download(format!("create {}: {}", path.display(), e)))?;

    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| SyncError::Download(e.to_string()))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| SyncError::Download(e.to_string()))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(|e| SyncError::Download(e.to_string()))?;

    Ok(written)
}

async fn status_message(status: StatusCode, response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, body)
    }
}
