pub mod ftp;
pub mod gateway;
pub mod sftp;
pub mod webdav;

#[cfg(test)]
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub use gateway::RemoteGateway;

/// Metadata operation timeout (seconds) - stat, create_dir.
pub const OP_TIMEOUT_SECS: u64 = 60;
/// Transfer timeout (seconds) - read, write.
pub const IO_TIMEOUT_SECS: u64 = 300;

/// Remote file metadata.
#[derive(Debug, Clone)]
pub struct FileMeta {
    pub size: u64,
    pub modified_time: i64,
    pub is_dir: bool,
}

/// Folder existence with the failure cause kept visible.
///
/// `CheckFailed` means absence could not be proven; callers that only see
/// the boolean view treat it the same as `Absent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderStatus {
    Exists,
    Absent,
    CheckFailed,
}

impl FolderStatus {
    pub fn is_present(self) -> bool {
        matches!(self, FolderStatus::Exists)
    }
}

/// Minimal remote endpoint interface the gateway is built on.
///
/// Paths are forward-slash relative keys; directory paths end with `/`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Metadata for a path, `None` when the remote signals "not found".
    async fn stat(&self, path: &str) -> Result<Option<FileMeta>>;

    /// Reads a whole file.
    async fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Writes a whole file; a transport error mid-write is a failure.
    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()>;

    /// Creates one directory level; existing directories are not an error.
    async fn create_dir(&self, path: &str) -> Result<()>;

    /// Endpoint description for logs.
    fn name(&self) -> &str;
}

/// Builds the configured remote store.
pub fn connect_remote(config: &crate::config::RemoteConfig) -> Result<Arc<dyn RemoteStore>> {
    use crate::config::RemoteType;

    match config.typ {
        RemoteType::Ftp => {
            let host = config
                .host
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("FTP remote requires host"))?;
            tracing::info!("connecting FTP remote: {}", host);
            Ok(Arc::new(ftp::FtpStore::new(
                host,
                config.port.unwrap_or(21),
                config.username.as_deref(),
                config.password.as_deref(),
            )?) as Arc<dyn RemoteStore>)
        }
        RemoteType::Sftp => {
            let host = config
                .host
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("SFTP remote requires host"))?;
            let user = config
                .username
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("SFTP remote requires username"))?;
            let key_file = config
                .key_file
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("SFTP remote requires keyFile"))?;
            tracing::info!("connecting SFTP remote: {}@{}", user, host);
            Ok(Arc::new(sftp::SftpStore::new(
                host,
                config.port.unwrap_or(22),
                user,
                key_file,
            )?) as Arc<dyn RemoteStore>)
        }
        RemoteType::Webdav => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("WebDAV remote requires endpoint"))?;
            tracing::info!("connecting WebDAV remote: {}", endpoint);
            Ok(Arc::new(webdav::WebdavStore::new(
                endpoint,
                config.username.as_deref().unwrap_or(""),
                config.password.as_deref().unwrap_or(""),
            )?) as Arc<dyn RemoteStore>)
        }
    }
}
