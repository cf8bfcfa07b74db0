//! Persisted sync state - what was transferred when, per tracked path

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One tracked entry: a content fingerprint and when it was last synced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_hash: Option<String>,
    /// Seconds since the epoch at the last successful transfer.
    #[serde(default)]
    pub timestamp: f64,
}

/// Mapping from local path or remote key to its record.
pub type SyncState = HashMap<String, SyncRecord>;

/// Loads and persists the state file.
///
/// A bad state file must never block a sync run: load degrades to an
/// empty mapping, and a failed save leaves the previous file untouched.
pub struct SyncStateStore {
    path: PathBuf,
}

impl SyncStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Missing, unreadable, or malformed files all yield an empty mapping.
    pub fn load(&self) -> SyncState {
        let data = match std::fs::read(&self.path) {
            Ok(d) => d,
            Err(_) => {
                debug!("no sync state at {:?}, starting fresh", self.path);
                return SyncState::new();
            }
        };

        match serde_json::from_slice(&data) {
            Ok(state) => state,
            Err(e) => {
                warn!("sync state at {:?} is malformed ({}), starting fresh", self.path, e);
                SyncState::new()
            }
        }
    }

    /// Writes the whole mapping via a temp file + rename, so a reader
    /// never observes a half-written file.
    pub fn save(&self, state: &SyncState) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = serde_json::to_vec_pretty(state)?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, data)?;
        std::fs::rename(&temp_path, &self.path)?;

        debug!("persisted {} sync records to {:?}", state.len(), self.path);
        Ok(())
    }
}

/// Content fingerprint of a local file; empty string when it is absent.
/// Change detection only, not integrity.
pub fn fingerprint(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(data) => hash_bytes(&data),
        Err(_) => String::new(),
    }
}

/// BLAKE3, truncated to 32 hex chars - plenty to detect a change.
pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex()[..32].to_string()
}

/// Current wall clock as fractional epoch seconds.
pub fn now_epoch() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}

/// Records a completed transfer for both sides of a tracked pair.
pub fn record_transfer(
    state: &mut SyncState,
    local_key: &str,
    remote_key: &str,
    fingerprint: String,
) {
    let now = now_epoch();
    state.insert(
        local_key.to_string(),
        SyncRecord {
            local_hash: Some(fingerprint.clone()),
            remote_hash: None,
            timestamp: now,
        },
    );
    state.insert(
        remote_key.to_string(),
        SyncRecord {
            local_hash: None,
            remote_hash: Some(fingerprint),
            timestamp: now,
        },
    );
}
