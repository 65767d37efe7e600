//! Shared fixtures for integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::Notify;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use smart_asset_sync::host::{FsPackageImporter, JsonSceneHost};
use smart_asset_sync::{
    Config, EntityHandle, ImportOrchestrator, InstanceTag, LocalReferenceStore, PackageImporter,
    Result, SceneHost, SyncError,
};

pub const TOKEN_PATH: &str = "/oauth/token";

/// Gzip tar bytes with the given `(entry path, payload)` pairs.
pub fn archive_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, *data).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Package declaring one prefab per name.
pub fn package_with(prefabs: &[&str]) -> Vec<u8> {
    let entries: Vec<(String, String)> = prefabs
        .iter()
        .enumerate()
        .flat_map(|(i, name)| {
            vec![
                (format!("guid{}/pathname", i), format!("Assets/{}.prefab", name)),
                (format!("guid{}/asset", i), format!("prefab {}", name)),
            ]
        })
        .collect();
    let borrowed: Vec<(&str, &[u8])> = entries
        .iter()
        .map(|(p, d)| (p.as_str(), d.as_bytes()))
        .collect();
    archive_bytes(&borrowed)
}

pub fn usage_json(id: &str, instance_name: &str, binary_id: &str) -> Value {
    let binaries = if binary_id.is_empty() {
        json!([])
    } else {
        json!([{ "Id": format!("bin-{}", id), "BuildTarget": "StandaloneWindows", "Binary_Id": binary_id }])
    };
    json!({
        "Id": id,
        "InstanceName": instance_name,
        "SapId": null,
        "Image_Id": null,
        "SmartAssetVersion": {
            "createdAt": "2024-03-01T10:00:00Z",
            "Version": "1.0",
            "Binaries": binaries
        }
    })
}

pub fn detail_json(id: &str, name: &str, usages: Vec<Value>) -> Value {
    json!({ "Id": id, "Name": name, "SmartAssetVersionUsages": usages })
}

pub fn binary_path(binary_id: &str) -> String {
    format!("/v2/smart-assets/SmartAssetVersionBinary(guid'{}')/Data", binary_id)
}

pub fn image_path(image_id: &str) -> String {
    format!("/v2/smart-assets/SmartAssetVersionImage(guid'{}')/Data", image_id)
}

pub fn detail_path(scene_type_id: &str) -> String {
    format!("/vr-client/SceneType({})", scene_type_id)
}

pub async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "test-token",
            "jti": "jti-1"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub async fn mount_detail(server: &MockServer, detail: Value) {
    let id = detail["Id"].as_str().unwrap_or_default().to_string();
    Mock::given(method("GET"))
        .and(path(detail_path(&id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail))
        .mount(server)
        .await;
}

pub async fn mount_binary(server: &MockServer, binary_id: &str, body: Vec<u8>, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(binary_path(binary_id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
        .expect(expected_calls)
        .mount(server)
        .await;
}

pub fn config_for(server: &MockServer, base_dir: &Path) -> Config {
    let mut config = Config::default();
    config.credentials.token_url = format!("{}{}", server.uri(), TOKEN_PATH);
    config.credentials.client_id = "client".to_string();
    config.credentials.client_secret = "secret".to_string();
    config.api.base_url = server.uri();
    config.cache.base_dir = base_dir.to_path_buf();
    config
}

/// Importer that counts calls and can be held open by a test.
pub struct CountingImporter {
    inner: FsPackageImporter,
    pub calls: AtomicUsize,
    gate: Option<(Arc<Notify>, Arc<Notify>)>,
}

impl CountingImporter {
    pub fn new(prefab_dir: PathBuf) -> Self {
        Self {
            inner: FsPackageImporter::new(prefab_dir),
            calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Signal `started` on entry, then wait for `release` before importing.
    pub fn gated(prefab_dir: PathBuf, started: Arc<Notify>, release: Arc<Notify>) -> Self {
        Self {
            gate: Some((started, release)),
            ..Self::new(prefab_dir)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PackageImporter for CountingImporter {
    async fn apply_archive(&self, archive: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some((started, release)) = &self.gate {
            started.notify_one();
            release.notified().await;
        }
        self.inner.apply_archive(archive).await
    }
}

/// Headless scene that counts instantiations.
pub struct CountingScene {
    pub inner: JsonSceneHost,
    pub instantiations: AtomicUsize,
    fail_next_tag: AtomicBool,
}

impl CountingScene {
    pub fn new(prefab_dir: PathBuf) -> Self {
        Self {
            inner: JsonSceneHost::new(prefab_dir),
            instantiations: AtomicUsize::new(0),
            fail_next_tag: AtomicBool::new(false),
        }
    }

    /// Make the next `attach_tag` call fail.
    pub fn reject_next_tag(&self) {
        self.fail_next_tag.store(true, Ordering::SeqCst);
    }

    pub fn instantiations(&self) -> usize {
        self.instantiations.load(Ordering::SeqCst)
    }
}

impl SceneHost for CountingScene {
    fn instantiate(&self, prefab: &str) -> Result<EntityHandle> {
        self.instantiations.fetch_add(1, Ordering::SeqCst);
        self.inner.instantiate(prefab)
    }

    fn set_name(&self, entity: EntityHandle, name: &str) -> Result<()> {
        self.inner.set_name(entity, name)
    }

    fn attach_tag(&self, entity: EntityHandle, tag: &InstanceTag) -> Result<()> {
        if self.fail_next_tag.swap(false, Ordering::SeqCst) {
            return Err(SyncError::Host("tag component rejected".to_string()));
        }
        self.inner.attach_tag(entity, tag)
    }

    fn remove(&self, entity: EntityHandle) -> Result<()> {
        self.inner.remove(entity)
    }

    fn update_master_data(&self, instance_id: &str, sap_id: &str) -> Result<()> {
        self.inner.update_master_data(instance_id, sap_id)
    }

    fn apply_image(&self, instance_id: &str, image: &Path) -> Result<()> {
        self.inner.apply_image(instance_id, image)
    }
}

/// Everything a pipeline test needs, rooted in a temp directory.
pub struct Harness {
    pub temp: TempDir,
    pub importer: Arc<CountingImporter>,
    pub scene: Arc<CountingScene>,
    pub orchestrator: ImportOrchestrator,
}

impl Harness {
    pub fn new(server: &MockServer) -> Self {
        Self::with_references(server, LocalReferenceStore::new())
    }

    pub fn with_references(server: &MockServer, references: LocalReferenceStore) -> Self {
        let temp = TempDir::new().unwrap();
        let importer = Arc::new(CountingImporter::new(prefab_dir(temp.path())));
        Self::build(server, temp, importer, references)
    }

    pub fn build(
        server: &MockServer,
        temp: TempDir,
        importer: Arc<CountingImporter>,
        references: LocalReferenceStore,
    ) -> Self {
        let scene = Arc::new(CountingScene::new(prefab_dir(temp.path())));
        let config = config_for(server, temp.path());
        let orchestrator =
            ImportOrchestrator::from_config(&config, importer.clone(), scene.clone(), references)
                .unwrap();
        Self {
            temp,
            importer,
            scene,
            orchestrator,
        }
    }

    pub fn base_dir(&self) -> &Path {
        self.temp.path()
    }

    pub fn prefab_dir(&self) -> PathBuf {
        prefab_dir(self.temp.path())
    }

    pub fn package_path(&self, binary_id: &str) -> PathBuf {
        self.temp
            .path()
            .join("Packages")
            .join(format!("{}.unitypackage", binary_id))
    }
}

pub fn prefab_dir(base_dir: &Path) -> PathBuf {
    base_dir.join("Prefabs")
}
