pub mod config;
pub mod core;
pub mod logging;
pub mod storage;

pub use config::{Role, SyncSettings};
pub use self::core::{SyncEngine, SyncReport, SyncStatus};

/// Platform base directories, resolved from the environment.
pub mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> Option<PathBuf> {
        if cfg!(target_os = "windows") {
            std::env::var("APPDATA").ok().map(PathBuf::from)
        } else if cfg!(target_os = "macos") {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library").join("Application Support"))
        } else {
            // Linux
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join(".config"))
        }
    }

    /// App data directory; falls back to a dot directory in the working
    /// directory when no home is available.
    pub fn data_dir() -> PathBuf {
        config_dir()
            .map(|p| p.join("favsync"))
            .unwrap_or_else(|| PathBuf::from(".favsync"))
    }
}
