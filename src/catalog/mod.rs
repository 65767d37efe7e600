//! Remote catalog of scene types
//!
//! - `GET /vr-client/SceneType` lists scene types
//! - `GET /vr-client/SceneType(<id>)?$expand=...` returns one scene type with
//!   usages, versions and binaries joined server side
//! - `GET /v2/smart-assets/SmartAssetVersionBinary(guid'<id>')/Data` serves
//!   package archives

pub mod client;
pub mod types;

pub use client::CatalogClient;
pub use types::{
    BinaryDescriptor, SceneTypeDetail, SceneTypeList, SceneTypeSummary,
    SmartAssetVersionDescriptor, SmartAssetVersionUsage,
};
