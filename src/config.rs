//! Configuration for smart-asset-sync
//!
//! Loaded from a TOML file and overridden from the command line:
//!
//! ```toml
//! [credentials]
//! token_url = "https://auth.example.com/oauth/token"
//! grant_type = "client_credentials"
//! client_id = "my-client"
//! client_secret = "..."
//!
//! [api]
//! base_url = "https://api.example.com"
//! timeout_secs = 30
//!
//! [cache]
//! base_dir = "./SmartAsset/Resources"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SyncError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

/// OAuth2 client-credentials settings
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Token endpoint URL
    #[serde(default)]
    pub token_url: String,

    #[serde(default = "default_grant_type")]
    pub grant_type: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,
}

// Keep the secret out of logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token_url", &self.token_url)
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            token_url: String::new(),
            grant_type: default_grant_type(),
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the catalog API (no trailing slash)
    #[serde(default)]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Root of the on-disk cache (`Packages/`, `Prefabs/`, `Images/`)
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Persisted scene-type references, relative to `base_dir` unless absolute
    #[serde(default = "default_references_file")]
    pub references_file: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: default_base_dir(),
            references_file: default_references_file(),
        }
    }
}

fn default_grant_type() -> String {
    "client_credentials".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_base_dir() -> PathBuf {
    PathBuf::from("SmartAsset/Resources")
}
fn default_references_file() -> PathBuf {
    PathBuf::from("references.json")
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, SyncError> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| SyncError::Config(e.to_string()))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), SyncError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| SyncError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check that everything needed to talk to the API is present
    pub fn validate(&self) -> Result<(), SyncError> {
        let missing = [
            ("credentials.token_url", self.credentials.token_url.is_empty()),
            ("credentials.client_id", self.credentials.client_id.is_empty()),
            ("api.base_url", self.api.base_url.is_empty()),
        ]
        .into_iter()
        .filter(|(_, empty)| *empty)
        .map(|(name, _)| name)
        .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(SyncError::Config(format!("missing {}", missing.join(", "))))
        }
    }

    /// API base URL without a trailing slash
    pub fn api_base_url(&self) -> &str {
        self.api.base_url.trim_end_matches('/')
    }

    pub fn references_path(&self) -> PathBuf {
        if self.cache.references_file.is_absolute() {
            self.cache.references_file.clone()
        } else {
            self.cache.base_dir.join(&self.cache.references_file)
        }
    }

    pub fn scene_path(&self) -> PathBuf {
        self.cache.base_dir.join("scene.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: Config = toml::from_str(
            r#"
[credentials]
token_url = "https://auth.example.com/token"
client_id = "abc"
"#,
        )
        .unwrap();

        assert_eq!(config.credentials.grant_type, "client_credentials");
        assert_eq!(config.api.timeout_secs, 30);
        assert_eq!(config.cache.base_dir, PathBuf::from("SmartAsset/Resources"));
        assert_eq!(
            config.references_path(),
            PathBuf::from("SmartAsset/Resources/references.json")
        );
    }

    #[test]
    fn test_validate_reports_missing_fields() {
        let err = Config::default().validate().unwrap_err();
        match err {
            SyncError::Config(msg) => {
                assert!(msg.contains("credentials.token_url"));
                assert!(msg.contains("api.base_url"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_debug_redacts_secret() {
        let creds = Credentials {
            client_secret: "hunter2".to_string(),
            ..Default::default()
        };
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_api_base_url_trims_slash() {
        let mut config = Config::default();
        config.api.base_url = "https://api.example.com/".to_string();
        assert_eq!(config.api_base_url(), "https://api.example.com");
    }
}
