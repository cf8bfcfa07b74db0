//! Transfer primitives over one remote endpoint

use super::{FolderStatus, RemoteStore};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upload/download/existence primitives against one remote endpoint.
///
/// The underlying session opens lazily on the first call and is reused for
/// the rest of the run; a dropped session is re-established on the next
/// call rather than failing permanently. Dropping the gateway releases it.
pub struct RemoteGateway {
    store: Arc<dyn RemoteStore>,
}

impl RemoteGateway {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Normalizes a remote path into a store key: forward slashes, no
    /// leading slash.
    fn remote_key(path: &str) -> String {
        path.replace('\\', "/").trim_start_matches('/').to_string()
    }

    /// Uploads a local file, creating missing remote ancestor directories
    /// first. Success means the remote write completed.
    pub async fn upload(&self, local: &Path, remote: &str) -> Result<()> {
        let data = tokio::fs::read(local)
            .await
            .with_context(|| format!("local file not readable: {}", local.display()))?;

        let key = Self::remote_key(remote);
        self.ensure_remote_dirs(&key).await;
        self.store
            .write(&key, data)
            .await
            .with_context(|| format!("remote write rejected: {}", remote))?;

        info!("uploaded {} -> {}", local.display(), remote);
        Ok(())
    }

    /// Downloads a remote file, creating missing local ancestor
    /// directories. Written via a temp file + rename so a failed transfer
    /// never truncates the previous local copy.
    pub async fn download(&self, remote: &str, local: &Path) -> Result<()> {
        let key = Self::remote_key(remote);
        let data = self
            .store
            .read(&key)
            .await
            .with_context(|| format!("remote read failed: {}", remote))?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("cannot create local directory: {}", parent.display()))?;
        }

        let temp_path = local.with_extension("tmp");
        tokio::fs::write(&temp_path, &data).await?;
        tokio::fs::rename(&temp_path, local).await?;

        info!("downloaded {} -> {}", remote, local.display());
        Ok(())
    }

    /// Three-valued folder check: a transport failure is not absence.
    pub async fn folder_status(&self, path: &str) -> FolderStatus {
        let key = format!("{}/", Self::remote_key(path).trim_end_matches('/'));
        match self.store.stat(&key).await {
            Ok(Some(_)) => FolderStatus::Exists,
            Ok(None) => FolderStatus::Absent,
            Err(e) => {
                warn!("folder check failed for {}: {:#}", path, e);
                FolderStatus::CheckFailed
            }
        }
    }

    /// Boolean view of [`folder_status`]: absent and check-failed both
    /// read as false.
    ///
    /// [`folder_status`]: Self::folder_status
    pub async fn folder_exists(&self, path: &str) -> bool {
        self.folder_status(path).await.is_present()
    }

    /// Whether a remote file exists; a transport failure is an error here,
    /// not a "no".
    pub async fn exists(&self, path: &str) -> Result<bool> {
        Ok(self.store.stat(&Self::remote_key(path)).await?.is_some())
    }

    /// Writes raw bytes to a remote path. No ancestors are created: the
    /// write fails when the enclosing folder is missing.
    pub async fn write_bytes(&self, remote: &str, data: Vec<u8>) -> Result<()> {
        self.store.write(&Self::remote_key(remote), data).await
    }

    /// Creates every missing ancestor directory of `key`, one level at a
    /// time. Create errors are ignored; a directory that is genuinely
    /// missing fails the write that follows instead.
    async fn ensure_remote_dirs(&self, key: &str) {
        let Some((parent, _)) = key.rsplit_once('/') else {
            return;
        };
        let mut current = String::new();
        for part in parent.split('/').filter(|s| !s.is_empty()) {
            current.push_str(part);
            current.push('/');
            if let Err(e) = self.store.create_dir(&current).await {
                debug!("create_dir {} (may already exist): {:#}", current, e);
            }
        }
    }

    /// Endpoint description for logs.
    pub fn name(&self) -> &str {
        self.store.name()
    }
}
