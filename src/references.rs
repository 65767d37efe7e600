//! Local reference store
//!
//! Records which remote usages have already been instantiated locally, per
//! scene type. This is what makes re-running an import idempotent.
//!
//! Persisted as JSON:
//!
//! ```json
//! [{"id": "S1", "name": "Room", "instances": [{"id": "U1", "name": "Chair", "version": "1.0"}]}]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

use crate::error::Result;

/// Bookkeeping record for one instantiated usage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalInstance {
    /// Remote usage id
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Everything imported for one scene type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalReference {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub instances: Vec<LocalInstance>,
}

impl LocalReference {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            instances: Vec::new(),
        }
    }

    pub fn has_instance(&self, id: &str) -> bool {
        self.get_instance(id).is_some()
    }

    pub fn get_instance(&self, id: &str) -> Option<&LocalInstance> {
        self.instances.iter().find(|i| i.id == id)
    }

    /// Register an instance. Returns false, leaving the set unchanged, if an
    /// instance with the same id is already registered.
    pub fn add_instance(&mut self, instance: LocalInstance) -> bool {
        if self.has_instance(&instance.id) {
            return false;
        }
        self.instances.push(instance);
        true
    }

    pub fn remove_instance(&mut self, id: &str) -> Option<LocalInstance> {
        let pos = self.instances.iter().position(|i| i.id == id)?;
        Some(self.instances.remove(pos))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalReferenceStore {
    references: Vec<LocalReference>,
}

impl LocalReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, scene_type_id: &str) -> Option<&LocalReference> {
        self.references.iter().find(|r| r.id == scene_type_id)
    }

    pub fn find_mut(&mut self, scene_type_id: &str) -> Option<&mut LocalReference> {
        self.references.iter_mut().find(|r| r.id == scene_type_id)
    }

    /// Reference for `scene_type_id`, appending an empty one if none exists.
    pub fn find_or_create(&mut self, scene_type_id: &str, name: &str) -> &mut LocalReference {
        let pos = match self.references.iter().position(|r| r.id == scene_type_id) {
            Some(pos) => pos,
            None => {
                debug!(scene_type_id = %scene_type_id, name = %name, "Creating scene type reference");
                self.references.push(LocalReference::new(scene_type_id, name));
                self.references.len() - 1
            }
        };
        &mut self.references[pos]
    }

    pub fn references(&self) -> &[LocalReference] {
        &self.references
    }

    pub fn len(&self) -> usize {
        self.references.len()
    }

    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
    }

    /// Load from a JSON file; a missing file is an empty store.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No reference file, starting empty");
            return Ok(Self::new());
        }
        let content = std::fs::read_to_string(path)?;
        let store: Self = serde_json::from_str(&content)?;
        info!(path = %path.display(), references = store.len(), "Loaded scene type references");
        Ok(store)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        debug!(path = %path.display(), "Saved scene type references");
        Ok(())
    }
}
