//! Sync orchestration
//!
//! One straight-line pass per invocation: detect role, verify the remote
//! namespace, sync the standard favourites, then each static folder
//! independently, persist state, report. Transport failures are contained
//! at tracked-file granularity; only a missing namespace ends the run
//! early.

use crate::config::{Role, SyncSettings, TrackedFile};
use crate::core::decision::needs_sync;
use crate::core::state::{self, SyncState, SyncStateStore};
use crate::storage::{FolderStatus, RemoteGateway, RemoteStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Aggregate outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Completed,
    Failed,
}

/// End-of-run summary. Detailed errors go to the log; this carries one
/// line per failed tracked file.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub status: SyncStatus,
    pub role: Role,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: u64,
    pub files_synced: u32,
    pub files_skipped: u32,
    pub files_failed: u32,
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        self.status == SyncStatus::Completed
    }
}

/// What happened to one tracked file.
enum FileOutcome {
    Transferred,
    Skipped,
    Failed(String),
}

/// Runs one synchronization pass against one remote endpoint.
pub struct SyncEngine {
    settings: SyncSettings,
    gateway: RemoteGateway,
    state_store: SyncStateStore,
}

impl SyncEngine {
    pub fn new(settings: SyncSettings, store: Arc<dyn RemoteStore>) -> Self {
        let state_store = SyncStateStore::new(settings.state_path());
        Self {
            settings,
            gateway: RemoteGateway::new(store),
            state_store,
        }
    }

    /// Runs the full pass. Never returns an error: the report carries the
    /// outcome.
    pub async fn run(&self) -> SyncReport {
        let start_time = chrono::Utc::now().timestamp();

        info!("favourites sync started ({})", self.gateway.name());

        let role = self.detect_role().await;
        info!("running as {}", role);

        // The namespace folder is never created implicitly; a missing or
        // unverifiable namespace ends the run before any transfer.
        let namespace = self.settings.remote.namespace_root();
        match self.gateway.folder_status(&namespace).await {
            FolderStatus::Exists => debug!("namespace folder verified: {}", namespace),
            FolderStatus::Absent => {
                error!("namespace folder not found: {}", namespace);
                return Self::failed_report(
                    role,
                    start_time,
                    vec![format!("namespace folder not found: {}", namespace)],
                );
            }
            FolderStatus::CheckFailed => {
                error!("namespace folder could not be verified: {}", namespace);
                return Self::failed_report(
                    role,
                    start_time,
                    vec![format!("cannot verify namespace folder: {}", namespace)],
                );
            }
        }

        let mut state = self.state_store.load();
        let mut synced = 0u32;
        let mut skipped = 0u32;
        let mut failed = 0u32;
        let mut errors = Vec::new();

        let mut tally = |outcome: FileOutcome| match outcome {
            FileOutcome::Transferred => synced += 1,
            FileOutcome::Skipped => skipped += 1,
            FileOutcome::Failed(e) => {
                failed += 1;
                errors.push(e);
            }
        };

        let standard = self.settings.standard_file();
        tally(self.sync_tracked(&standard, role, &mut state).await);

        for file in self.settings.static_files() {
            tally(self.sync_tracked(&file, role, &mut state).await);

            // Explicit override: when enabled, the designated folder is
            // additionally pulled from the override namespace, bypassing
            // the needs-sync heuristic entirely.
            if role == Role::Secondary
                && self.settings.overwrite_static
                && file.label == self.settings.specific_folder
            {
                tally(self.overwrite_from_specific(&file, &mut state).await);
            }
        }

        if let Err(e) = self.state_store.save(&state) {
            warn!("failed to persist sync state: {:#}", e);
        }

        // Aggregate failure only when every attempted transfer failed.
        let status = if failed > 0 && synced == 0 {
            SyncStatus::Failed
        } else {
            SyncStatus::Completed
        };

        let end_time = chrono::Utc::now().timestamp();
        info!(
            "favourites sync finished: {} synced, {} skipped, {} failed",
            synced, skipped, failed
        );

        SyncReport {
            status,
            role,
            start_time,
            end_time,
            duration: (end_time - start_time) as u64,
            files_synced: synced,
            files_skipped: skipped,
            files_failed: failed,
            errors,
        }
    }

    /// Determines the role for this run.
    ///
    /// With auto-detection on, the marker file decides: present means some
    /// other installation already claimed primary, absent means this one
    /// claims it and writes the marker so the next instance sees a claimed
    /// namespace. A failed check falls back silently to the configured
    /// role.
    async fn detect_role(&self) -> Role {
        if !self.settings.auto_detect_role {
            return self.settings.role;
        }

        let marker = self.settings.remote.marker_path();
        match self.gateway.exists(&marker).await {
            Ok(true) => {
                debug!("primary marker present, acting as secondary");
                Role::Secondary
            }
            Ok(false) => {
                // The marker write does not create directories: a missing
                // namespace still fails the verification step after this.
                if let Err(e) = self
                    .gateway
                    .write_bytes(&marker, marker_content().into_bytes())
                    .await
                {
                    warn!("could not write primary marker: {:#}", e);
                }
                Role::Primary
            }
            Err(e) => {
                warn!(
                    "marker check failed, falling back to configured role: {:#}",
                    e
                );
                self.settings.role
            }
        }
    }

    /// Syncs one tracked pair in the direction implied by the role and
    /// updates the state on success.
    async fn sync_tracked(
        &self,
        file: &TrackedFile,
        role: Role,
        state: &mut SyncState,
    ) -> FileOutcome {
        let local_key = file.local.to_string_lossy().to_string();
        let current = state::fingerprint(&file.local);

        if !needs_sync(state, &local_key, &file.remote, &current) {
            debug!("unchanged, skipping: {}", file.label);
            return FileOutcome::Skipped;
        }

        let result = match role {
            Role::Primary => self.gateway.upload(&file.local, &file.remote).await,
            Role::Secondary => self.gateway.download(&file.remote, &file.local).await,
        };

        match result {
            Ok(()) => {
                let fp = state::fingerprint(&file.local);
                state::record_transfer(state, &local_key, &file.remote, fp);
                info!("synced {}", file.label);
                FileOutcome::Transferred
            }
            Err(e) => {
                error!("sync failed for {}: {:#}", file.label, e);
                FileOutcome::Failed(format!("{}: {:#}", file.label, e))
            }
        }
    }

    /// Unconditional pull of the designated folder from the override
    /// namespace, overwriting the local copy.
    async fn overwrite_from_specific(
        &self,
        file: &TrackedFile,
        state: &mut SyncState,
    ) -> FileOutcome {
        let source = self
            .settings
            .remote
            .override_remote(&self.settings.specific_folder);

        match self.gateway.download(&source, &file.local).await {
            Ok(()) => {
                let local_key = file.local.to_string_lossy().to_string();
                let fp = state::fingerprint(&file.local);
                state::record_transfer(state, &local_key, &source, fp);
                info!("overwrote {} from {}", file.label, source);
                FileOutcome::Transferred
            }
            Err(e) => {
                error!("overwrite failed for {}: {:#}", file.label, e);
                FileOutcome::Failed(format!("{} (overwrite): {:#}", file.label, e))
            }
        }
    }

    fn failed_report(role: Role, start_time: i64, errors: Vec<String>) -> SyncReport {
        let end_time = chrono::Utc::now().timestamp();
        SyncReport {
            status: SyncStatus::Failed,
            role,
            start_time,
            end_time,
            duration: (end_time - start_time) as u64,
            files_synced: 0,
            files_skipped: 0,
            files_failed: 0,
            errors,
        }
    }
}

/// Free-text diagnostic content for the marker file.
fn marker_content() -> String {
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown-host".to_string());
    format!("{} {}", host, chrono::Utc::now().to_rfc3339())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{LocalPaths, RemoteConfig, RemoteType};
    use crate::storage::mock::MemoryStore;
    use std::path::Path;

    const NAMESPACE: &str = "media/auto_fav_sync/alice";
    const STANDARD_REMOTE: &str = "media/auto_fav_sync/alice/favourites.xml";

    fn test_settings(dir: &Path, role: Role) -> SyncSettings {
        SyncSettings {
            enabled: true,
            role,
            auto_detect_role: false,
            overwrite_static: false,
            specific_folder: String::new(),
            static_folders: vec![],
            remote: RemoteConfig {
                typ: RemoteType::Ftp,
                host: Some("test".into()),
                port: None,
                username: None,
                password: None,
                key_file: None,
                endpoint: None,
                base_path: "media".into(),
                namespace_folder: "alice".into(),
            },
            paths: LocalPaths {
                favourites: dir.join("favourites.xml"),
                static_root: dir.join("static"),
                state_file: Some(dir.join("state.json")),
            },
            log: Default::default(),
        }
    }

    fn engine(settings: SyncSettings, store: &Arc<MemoryStore>) -> SyncEngine {
        SyncEngine::new(settings, store.clone() as Arc<dyn RemoteStore>)
    }

    #[tokio::test]
    async fn missing_namespace_fails_before_any_transfer() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("favourites.xml"), b"local").unwrap();
        let store = Arc::new(MemoryStore::new());

        let report = engine(test_settings(dir.path(), Role::Primary), &store)
            .run()
            .await;

        assert_eq!(report.status, SyncStatus::Failed);
        assert_eq!(store.reads(), 0);
        assert_eq!(store.writes(), 0);
        assert!(report.errors[0].contains("not found"));
    }

    #[tokio::test]
    async fn unverifiable_namespace_also_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);
        store.fail_stat_on("media/auto_fav_sync/alice/");

        let report = engine(test_settings(dir.path(), Role::Primary), &store)
            .run()
            .await;

        assert_eq!(report.status, SyncStatus::Failed);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn primary_uploads_changed_favourites_and_records_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("favourites.xml"), b"<favourites/>").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);

        let settings = test_settings(dir.path(), Role::Primary);
        let started = state::now_epoch();
        let report = engine(settings.clone(), &store).run().await;

        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(report.files_synced, 1);
        assert_eq!(store.writes(), 1);
        assert_eq!(
            store.file(STANDARD_REMOTE).as_deref(),
            Some(b"<favourites/>".as_slice())
        );

        let state = SyncStateStore::new(settings.state_path()).load();
        let local_key = settings.paths.favourites.to_string_lossy().to_string();
        let record = &state[&local_key];
        assert_eq!(
            record.local_hash.as_deref(),
            Some(state::hash_bytes(b"<favourites/>").as_str())
        );
        assert!(record.timestamp >= started);
        assert!(state.contains_key(STANDARD_REMOTE));
    }

    #[tokio::test]
    async fn unchanged_favourites_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("favourites.xml"), b"<favourites/>").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);

        let settings = test_settings(dir.path(), Role::Primary);
        let local_key = settings.paths.favourites.to_string_lossy().to_string();
        let mut state = SyncState::new();
        state::record_transfer(
            &mut state,
            &local_key,
            STANDARD_REMOTE,
            state::hash_bytes(b"<favourites/>"),
        );
        SyncStateStore::new(settings.state_path())
            .save(&state)
            .unwrap();

        let report = engine(settings, &store).run().await;

        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(report.files_skipped, 1);
        assert_eq!(store.writes(), 0);
    }

    #[tokio::test]
    async fn secondary_downloads_standard_favourites() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);
        store.insert_file(STANDARD_REMOTE, b"<favourites from=\"primary\"/>");

        let settings = test_settings(dir.path(), Role::Secondary);
        let report = engine(settings.clone(), &store).run().await;

        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(report.files_synced, 1);
        assert_eq!(
            std::fs::read(&settings.paths.favourites).unwrap(),
            b"<favourites from=\"primary\"/>"
        );
    }

    #[tokio::test]
    async fn overwrite_pulls_designated_folder_from_override_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);
        store.insert_file(STANDARD_REMOTE, b"std");
        store.insert_file("media/auto_fav_sync/alice/kids/favourites.xml", b"regular");
        store.insert_file("media/auto_fav_sync/kids/favourites.xml", b"override");

        let mut settings = test_settings(dir.path(), Role::Secondary);
        settings.static_folders = vec!["kids".into()];
        settings.overwrite_static = true;
        settings.specific_folder = "kids".into();

        let report = engine(settings.clone(), &store).run().await;

        assert_eq!(report.status, SyncStatus::Completed);
        // standard + regular kids download + unconditional override
        assert_eq!(report.files_synced, 3);
        let local_kids = settings.paths.static_root.join("kids").join("favourites.xml");
        assert_eq!(std::fs::read(&local_kids).unwrap(), b"override");
    }

    #[tokio::test]
    async fn one_folder_failing_does_not_block_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);
        store.insert_file(STANDARD_REMOTE, b"std");
        // "one" is absent remotely; "two" downloads fine
        store.insert_file("media/auto_fav_sync/alice/two/favourites.xml", b"two");

        let mut settings = test_settings(dir.path(), Role::Secondary);
        settings.static_folders = vec!["one".into(), "two".into()];

        let report = engine(settings.clone(), &store).run().await;

        assert_eq!(report.status, SyncStatus::Completed);
        assert_eq!(report.files_synced, 2);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.errors.len(), 1);

        let state = SyncStateStore::new(settings.state_path()).load();
        let two_key = settings
            .paths
            .static_root
            .join("two")
            .join("favourites.xml")
            .to_string_lossy()
            .to_string();
        let one_key = settings
            .paths
            .static_root
            .join("one")
            .join("favourites.xml")
            .to_string_lossy()
            .to_string();
        assert!(state.contains_key(&two_key));
        assert!(!state.contains_key(&one_key));
    }

    #[tokio::test]
    async fn all_transfers_failing_reports_failure() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("favourites.xml"), b"local").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);
        store.fail_write_on(STANDARD_REMOTE);

        let report = engine(test_settings(dir.path(), Role::Primary), &store)
            .run()
            .await;

        assert_eq!(report.status, SyncStatus::Failed);
        assert_eq!(report.files_failed, 1);
        assert_eq!(report.files_synced, 0);
    }

    #[tokio::test]
    async fn auto_detection_claims_primary_and_writes_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("favourites.xml"), b"mine").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);

        // configured secondary, but no marker anywhere: this run claims it
        let mut settings = test_settings(dir.path(), Role::Secondary);
        settings.auto_detect_role = true;

        let report = engine(settings, &store).run().await;

        assert_eq!(report.role, Role::Primary);
        assert!(store
            .file("media/auto_fav_sync/alice/.main_system")
            .is_some());
        assert_eq!(
            store.file(STANDARD_REMOTE).as_deref(),
            Some(b"mine".as_slice())
        );
    }

    #[tokio::test]
    async fn auto_detection_defers_to_existing_marker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("favourites.xml"), b"mine").unwrap();
        let store = Arc::new(MemoryStore::new());
        store.add_dir(NAMESPACE);
        store.insert_file("media/auto_fav_sync/alice/.main_system", b"otherhost");
        store.insert_file(STANDARD_REMOTE, b"theirs");

        let mut settings = test_settings(dir.path(), Role::Primary);
        settings.auto_detect_role = true;

        let report = engine(settings.clone(), &store).run().await;

        assert_eq!(report.role, Role::Secondary);
        assert_eq!(
            std::fs::read(&settings.paths.favourites).unwrap(),
            b"theirs"
        );
    }
}
