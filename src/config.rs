//! Application configuration
//!
//! Loaded once at process entry into an immutable value; components receive
//! it by reference. Nothing reads settings after startup.

use crate::logging::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors are fatal and surface before any network attempt.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("config file {path} is not valid JSON: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{0} must not be empty")]
    MissingField(&'static str),
}

/// Which side of the sync relationship this installation is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Primary,
    Secondary,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Primary => write!(f, "primary"),
            Role::Secondary => write!(f, "secondary"),
        }
    }
}

/// Remote backend type.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteType {
    Ftp,
    Sftp,
    Webdav,
}

/// Remote endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteConfig {
    #[serde(rename = "type")]
    pub typ: RemoteType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Private key path, SFTP only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_file: Option<String>,
    /// Full endpoint URL, WebDAV only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Path prefix on the remote under which the sync tree lives.
    #[serde(default)]
    pub base_path: String,
    /// User-chosen folder scoping one group of synced installations.
    pub namespace_folder: String,
}

impl RemoteConfig {
    /// Root of the whole sync tree: `/{basePath}/auto_fav_sync`.
    fn sync_root(&self) -> String {
        let base = self.base_path.trim_matches('/');
        if base.is_empty() {
            "/auto_fav_sync".to_string()
        } else {
            format!("/{}/auto_fav_sync", base)
        }
    }

    /// Namespace folder for this installation group.
    pub fn namespace_root(&self) -> String {
        format!("{}/{}", self.sync_root(), self.namespace_folder)
    }

    /// Marker file the primary writes to claim the namespace.
    pub fn marker_path(&self) -> String {
        format!("{}/.main_system", self.namespace_root())
    }

    /// Standard favourites file inside the namespace.
    pub fn standard_remote(&self) -> String {
        format!("{}/favourites.xml", self.namespace_root())
    }

    /// Per-static-folder favourites file inside the namespace.
    pub fn static_remote(&self, folder: &str) -> String {
        format!("{}/{}/favourites.xml", self.namespace_root(), folder)
    }

    /// Override source: a differently-namespaced favourites file, used by
    /// the overwrite path on secondaries.
    pub fn override_remote(&self, specific_folder: &str) -> String {
        format!("{}/{}/favourites.xml", self.sync_root(), specific_folder)
    }
}

/// Local filesystem locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalPaths {
    /// The standard favourites file.
    pub favourites: PathBuf,
    /// Directory holding `{folder}/favourites.xml` per static folder.
    pub static_root: PathBuf,
    /// Persisted sync state; defaults next to the other app data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,
}

/// One (local file, remote file) pair handled in a run.
#[derive(Debug, Clone)]
pub struct TrackedFile {
    pub label: String,
    pub local: PathBuf,
    pub remote: String,
}

/// Everything the tool needs for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub role: Role,
    /// Let the remote marker file decide the role instead of `role`.
    #[serde(default)]
    pub auto_detect_role: bool,
    #[serde(default)]
    pub overwrite_static: bool,
    #[serde(default)]
    pub specific_folder: String,
    #[serde(default)]
    pub static_folders: Vec<String>,
    pub remote: RemoteConfig,
    pub paths: LocalPaths,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_enabled() -> bool {
    true
}

impl SyncSettings {
    /// Loads and validates the configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let settings: SyncSettings =
            serde_json::from_str(&content).map_err(|source| ConfigError::Malformed {
                path: path.to_path_buf(),
                source,
            })?;
        settings.validate()?;
        Ok(settings)
    }

    /// Fails on anything that would make every network call pointless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.namespace_folder.trim().is_empty() {
            return Err(ConfigError::MissingField("remote.namespaceFolder"));
        }
        match self.remote.typ {
            RemoteType::Ftp => {
                if self.remote.host.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::MissingField("remote.host"));
                }
            }
            RemoteType::Sftp => {
                if self.remote.host.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::MissingField("remote.host"));
                }
                if self.remote.username.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::MissingField("remote.username"));
                }
                if self.remote.key_file.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::MissingField("remote.keyFile"));
                }
            }
            RemoteType::Webdav => {
                if self.remote.endpoint.as_deref().unwrap_or("").is_empty() {
                    return Err(ConfigError::MissingField("remote.endpoint"));
                }
            }
        }
        Ok(())
    }

    /// The standard favourites pair.
    pub fn standard_file(&self) -> TrackedFile {
        TrackedFile {
            label: "favourites".to_string(),
            local: self.paths.favourites.clone(),
            remote: self.remote.standard_remote(),
        }
    }

    /// One pair per configured static folder; blank names are skipped.
    pub fn static_files(&self) -> Vec<TrackedFile> {
        self.static_folders
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(|folder| TrackedFile {
                label: folder.to_string(),
                local: self.paths.static_root.join(folder).join("favourites.xml"),
                remote: self.remote.static_remote(folder),
            })
            .collect()
    }

    /// Where the persisted sync state lives.
    pub fn state_path(&self) -> PathBuf {
        self.paths
            .state_file
            .clone()
            .unwrap_or_else(|| crate::dirs::data_dir().join("sync_state.json"))
    }
}
