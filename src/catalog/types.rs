//! Catalog API types
//!
//! Field names follow the OData service (`Id`, `InstanceName`, `Binary_Id`, ...).
//! Missing or `null` fields deserialize to their empty value.

use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit JSON `null` the same as a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Response body of the scene type listing
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneTypeList {
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: Vec<SceneTypeSummary>,
}

/// One entry of the catalog listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneTypeSummary {
    #[serde(rename = "Id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
}

/// Scene type with usages, versions and binaries expanded
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneTypeDetail {
    #[serde(rename = "Id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "Name", default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(
        rename = "SmartAssetVersionUsages",
        default,
        deserialize_with = "null_as_default"
    )]
    pub usages: Vec<SmartAssetVersionUsage>,
}

impl SceneTypeDetail {
    pub fn summary(&self) -> SceneTypeSummary {
        SceneTypeSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// A placement of one asset version inside a scene type
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartAssetVersionUsage {
    /// Stable remote id; the join key for local instances
    #[serde(rename = "Id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "InstanceName", default, deserialize_with = "null_as_default")]
    pub instance_name: String,
    #[serde(rename = "SapId", default)]
    pub sap_id: Option<String>,
    #[serde(rename = "Image_Id", default)]
    pub image_id: Option<String>,
    #[serde(rename = "SmartAssetVersion", default, deserialize_with = "null_as_default")]
    pub version: SmartAssetVersionDescriptor,
}

impl SmartAssetVersionUsage {
    /// Binary id of the first binary; only index 0 is ever consumed.
    /// Empty when the version has no binaries.
    pub fn primary_binary_id(&self) -> &str {
        self.version
            .binaries
            .first()
            .map(|b| b.binary_id.as_str())
            .unwrap_or("")
    }

    pub fn sap_id(&self) -> Option<&str> {
        self.sap_id.as_deref().filter(|s| !s.is_empty())
    }

    pub fn image_id(&self) -> Option<&str> {
        self.image_id.as_deref().filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SmartAssetVersionDescriptor {
    #[serde(rename = "createdAt", default, deserialize_with = "null_as_default")]
    pub created_at: String,
    #[serde(rename = "Version", default, deserialize_with = "null_as_default")]
    pub version_label: String,
    #[serde(rename = "Binaries", default, deserialize_with = "null_as_default")]
    pub binaries: Vec<BinaryDescriptor>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BinaryDescriptor {
    #[serde(rename = "Id", default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "BuildTarget", default, deserialize_with = "null_as_default")]
    pub build_target: String,
    /// Remote content id; empty means no binary is available
    #[serde(rename = "Binary_Id", default, deserialize_with = "null_as_default")]
    pub binary_id: String,
}
