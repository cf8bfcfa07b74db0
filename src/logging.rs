//! File logging with size-based rotation

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// Log settings, part of the application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Maximum log file size before rotation (MB).
    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u32,
    /// "error", "warn", "info", "debug" or "trace".
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_enabled() -> bool {
    true
}

fn default_max_size_mb() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            max_size_mb: default_max_size_mb(),
            level: default_level(),
        }
    }
}

impl LogConfig {
    /// Converts the configured level string to a tracing Level.
    pub fn tracing_level(&self) -> tracing::Level {
        match self.level.to_lowercase().as_str() {
            "error" => tracing::Level::ERROR,
            "warn" => tracing::Level::WARN,
            "debug" => tracing::Level::DEBUG,
            "trace" => tracing::Level::TRACE,
            _ => tracing::Level::INFO,
        }
    }
}

/// Log file writer that rotates to `favsync.log.old` once the size cap is hit.
pub struct SizeRotatingWriter {
    file_path: PathBuf,
    max_size: u64,
    writer: Arc<Mutex<Option<BufWriter<File>>>>,
}

impl SizeRotatingWriter {
    pub fn new(log_dir: &Path, max_size_mb: u32) -> io::Result<Self> {
        fs::create_dir_all(log_dir)?;

        let file_path = log_dir.join("favsync.log");
        let max_size = (max_size_mb as u64) * 1024 * 1024;
        let writer = Self::open_file(&file_path, max_size)?;

        Ok(Self {
            file_path,
            max_size,
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }

    fn open_file(file_path: &Path, max_size: u64) -> io::Result<BufWriter<File>> {
        if let Ok(metadata) = fs::metadata(file_path) {
            if metadata.len() > max_size {
                Self::rotate(file_path)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(file_path)?;
        Ok(BufWriter::new(file))
    }

    /// Moves the current log aside as `.log.old`, replacing any older backup.
    fn rotate(file_path: &Path) -> io::Result<()> {
        let backup_path = file_path.with_extension("log.old");
        if backup_path.exists() {
            fs::remove_file(&backup_path)?;
        }
        fs::rename(file_path, &backup_path)
    }
}

impl Clone for SizeRotatingWriter {
    fn clone(&self) -> Self {
        Self {
            file_path: self.file_path.clone(),
            max_size: self.max_size,
            writer: self.writer.clone(),
        }
    }
}

/// Handle produced per log event; checks the size cap after each write.
pub struct LogWriter {
    inner: Arc<Mutex<Option<BufWriter<File>>>>,
    file_path: PathBuf,
    max_size: u64,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self.inner.lock().unwrap();

        let Some(writer) = guard.as_mut() else {
            return Err(io::Error::other("log writer not available"));
        };
        let written = writer.write(buf)?;
        writer.flush()?;

        let over_cap = fs::metadata(&self.file_path)
            .map(|m| m.len() > self.max_size)
            .unwrap_or(false);
        if over_cap {
            if let Some(mut w) = guard.take() {
                let _ = w.flush();
            }
            let _ = SizeRotatingWriter::rotate(&self.file_path);
            if let Ok(new_writer) = SizeRotatingWriter::open_file(&self.file_path, self.max_size) {
                *guard = Some(new_writer);
            }
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self.inner.lock().unwrap();
        match guard.as_mut() {
            Some(writer) => writer.flush(),
            None => Ok(()),
        }
    }
}

impl<'a> MakeWriter<'a> for SizeRotatingWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            inner: self.writer.clone(),
            file_path: self.file_path.clone(),
            max_size: self.max_size,
        }
    }
}

/// Default log directory, under the platform data dir.
pub fn default_log_dir() -> PathBuf {
    crate::dirs::data_dir().join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotation_keeps_one_backup() {
        let dir = tempfile::tempdir().unwrap();
        let log = dir.path().join("favsync.log");
        fs::write(&log, b"first").unwrap();
        SizeRotatingWriter::rotate(&log).unwrap();
        fs::write(&log, b"second").unwrap();
        SizeRotatingWriter::rotate(&log).unwrap();

        let backup = log.with_extension("log.old");
        assert!(!log.exists());
        assert_eq!(fs::read(&backup).unwrap(), b"second");
    }

    #[test]
    fn writer_appends_across_handles() {
        let dir = tempfile::tempdir().unwrap();
        let rotating = SizeRotatingWriter::new(dir.path(), 5).unwrap();

        rotating.make_writer().write_all(b"one\n").unwrap();
        rotating.make_writer().write_all(b"two\n").unwrap();

        let content = fs::read_to_string(dir.path().join("favsync.log")).unwrap();
        assert_eq!(content, "one\ntwo\n");
    }
}
