//! In-memory remote store for tests, with per-path fault injection.

use super::{FileMeta, RemoteStore};
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, Vec<u8>>>,
    dirs: Mutex<HashSet<String>>,
    fail_read: Mutex<HashSet<String>>,
    fail_write: Mutex<HashSet<String>>,
    fail_stat: Mutex<HashSet<String>>,
    /// When set, writes fail unless the parent directory was created.
    strict_dirs: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_dir(&self, path: &str) {
        self.dirs
            .lock()
            .unwrap()
            .insert(path.trim_matches('/').to_string());
    }

    pub fn insert_file(&self, path: &str, data: &[u8]) {
        self.files
            .lock()
            .unwrap()
            .insert(path.trim_start_matches('/').to_string(), data.to_vec());
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap()
            .get(path.trim_start_matches('/'))
            .cloned()
    }

    pub fn fail_read_on(&self, path: &str) {
        self.fail_read.lock().unwrap().insert(path.to_string());
    }

    pub fn fail_write_on(&self, path: &str) {
        self.fail_write.lock().unwrap().insert(path.to_string());
    }

    pub fn fail_stat_on(&self, path: &str) {
        self.fail_stat.lock().unwrap().insert(path.to_string());
    }

    pub fn require_parent_dirs(&self) {
        self.strict_dirs.store(true, Ordering::SeqCst);
    }

    /// Completed or attempted read transfers.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Completed or attempted write transfers.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn stat(&self, path: &str) -> Result<Option<FileMeta>> {
        if self.fail_stat.lock().unwrap().contains(path) {
            bail!("injected stat failure: {}", path);
        }

        let key = path.trim_matches('/');
        if path.ends_with('/') {
            if self.dirs.lock().unwrap().contains(key) {
                return Ok(Some(FileMeta {
                    size: 0,
                    modified_time: 0,
                    is_dir: true,
                }));
            }
            return Ok(None);
        }

        if let Some(data) = self.files.lock().unwrap().get(key) {
            return Ok(Some(FileMeta {
                size: data.len() as u64,
                modified_time: 0,
                is_dir: false,
            }));
        }
        if self.dirs.lock().unwrap().contains(key) {
            return Ok(Some(FileMeta {
                size: 0,
                modified_time: 0,
                is_dir: true,
            }));
        }
        Ok(None)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_read.lock().unwrap().contains(path) {
            bail!("injected read failure: {}", path);
        }
        match self.files.lock().unwrap().get(path) {
            Some(data) => Ok(data.clone()),
            None => bail!("not found: {}", path),
        }
    }

    async fn write(&self, path: &str, data: Vec<u8>) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_write.lock().unwrap().contains(path) {
            bail!("injected write failure: {}", path);
        }
        if self.strict_dirs.load(Ordering::SeqCst) {
            let parent = path.rsplit_once('/').map(|(p, _)| p).unwrap_or("");
            if !parent.is_empty() && !self.dirs.lock().unwrap().contains(parent) {
                bail!("no such directory: {}", parent);
            }
        }
        self.files.lock().unwrap().insert(path.to_string(), data);
        Ok(())
    }

    async fn create_dir(&self, path: &str) -> Result<()> {
        self.dirs
            .lock()
            .unwrap()
            .insert(path.trim_matches('/').to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
