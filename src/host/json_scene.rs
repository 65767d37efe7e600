//! Headless scene host
//!
//! Keeps entities in memory and persists them as `scene.json`, so the
//! pipeline can run without an engine attached.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use super::{EntityHandle, InstanceTag, SceneHost};
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneEntity {
    pub handle: EntityHandle,
    pub prefab: String,
    pub name: String,
    #[serde(default)]
    pub tag: Option<InstanceTag>,
    #[serde(default)]
    pub master_data: Option<String>,
    #[serde(default)]
    pub image: Option<PathBuf>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct SceneState {
    next_handle: u64,
    entities: Vec<SceneEntity>,
}

pub struct JsonSceneHost {
    prefab_dir: PathBuf,
    state: Mutex<SceneState>,
}

impl JsonSceneHost {
    /// Empty scene resolving prefabs from `prefab_dir`
    pub fn new(prefab_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefab_dir: prefab_dir.into(),
            state: Mutex::new(SceneState::default()),
        }
    }

    /// Load a saved scene; a missing file is an empty scene.
    pub fn load(path: &Path, prefab_dir: impl Into<PathBuf>) -> Result<Self> {
        let host = Self::new(prefab_dir);
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let state: SceneState = serde_json::from_str(&content)?;
            info!(path = %path.display(), entities = state.entities.len(), "Loaded scene");
            *host.state()? = state;
        }
        Ok(host)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(&*self.state()?)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn entities(&self) -> Result<Vec<SceneEntity>> {
        Ok(self.state()?.entities.clone())
    }

    fn state(&self) -> Result<MutexGuard<'_, SceneState>> {
        self.state
            .lock()
            .map_err(|_| SyncError::Host("scene state lock poisoned".to_string()))
    }

    fn with_entity<F>(&self, entity: EntityHandle, f: F) -> Result<()>
    where
        F: FnOnce(&mut SceneEntity),
    {
        let mut state = self.state()?;
        let found = state
            .entities
            .iter_mut()
            .find(|e| e.handle == entity)
            .ok_or_else(|| SyncError::Host(format!("unknown entity {:?}", entity)))?;
        f(found);
        Ok(())
    }

    fn with_tagged<F>(&self, instance_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut SceneEntity),
    {
        let mut state = self.state()?;
        let found = state
            .entities
            .iter_mut()
            .find(|e| e.tag.as_ref().is_some_and(|t| t.id == instance_id))
            .ok_or_else(|| SyncError::Host(format!("no entity tagged {}", instance_id)))?;
        f(found);
        Ok(())
    }
}

impl SceneHost for JsonSceneHost {
    fn instantiate(&self, prefab: &str) -> Result<EntityHandle> {
        let prefab_path = self.prefab_dir.join(format!("{}.prefab", prefab));
        if !prefab_path.exists() {
            return Err(SyncError::Host(format!(
                "prefab {} not found at {}",
                prefab,
                prefab_path.display()
            )));
        }

        let mut state = self.state()?;
        state.next_handle += 1;
        let handle = EntityHandle(state.next_handle);
        state.entities.push(SceneEntity {
            handle,
            prefab: prefab.to_string(),
            name: prefab.to_string(),
            tag: None,
            master_data: None,
            image: None,
        });
        debug!(prefab = %prefab, handle = handle.0, "Instantiated entity");
        Ok(handle)
    }

    fn set_name(&self, entity: EntityHandle, name: &str) -> Result<()> {
        self.with_entity(entity, |e| e.name = name.to_string())
    }

    fn attach_tag(&self, entity: EntityHandle, tag: &InstanceTag) -> Result<()> {
        self.with_entity(entity, |e| e.tag = Some(tag.clone()))
    }

    fn remove(&self, entity: EntityHandle) -> Result<()> {
        let mut state = self.state()?;
        let before = state.entities.len();
        state.entities.retain(|e| e.handle != entity);
        if state.entities.len() == before {
            return Err(SyncError::Host(format!("unknown entity {:?}", entity)));
        }
        debug!(handle = entity.0, "Removed entity");
        Ok(())
    }

    fn update_master_data(&self, instance_id: &str, sap_id: &str) -> Result<()> {
        self.with_tagged(instance_id, |e| e.master_data = Some(sap_id.to_string()))
    }

    fn apply_image(&self, instance_id: &str, image: &Path) -> Result<()> {
        self.with_tagged(instance_id, |e| e.image = Some(image.to_path_buf()))
    }
}
