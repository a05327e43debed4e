//! Storage configuration and path management for fieldtrace.
//!
//! All path decisions live here so tests can inject a temp root and the
//! daemon, CLI, and platform shell agree on where every file lives.

use std::path::{Path, PathBuf};

/// Central configuration for all fieldtrace storage paths.
///
/// Production code uses `StorageConfig::default()` which points to
/// `~/.fieldtrace/`. Tests use `StorageConfig::with_root(temp_dir)` for
/// isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Root directory for all fieldtrace data (default: ~/.fieldtrace)
    root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let home = dirs::home_dir().expect("Could not find home directory");
        Self {
            root: home.join(".fieldtrace"),
        }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig with a custom root directory.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    /// Returns the root directory for fieldtrace data.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to agent.toml (agent configuration).
    pub fn config_file(&self) -> PathBuf {
        self.root.join("agent.toml")
    }

    /// Path to session.json (the persisted identity).
    pub fn session_file(&self) -> PathBuf {
        self.root.join("session.json")
    }

    /// Path to permissions.json, written by the platform shell when the user
    /// answers the OS location prompts.
    pub fn permissions_file(&self) -> PathBuf {
        self.root.join("permissions.json")
    }

    /// Path to position.json, the platform positioning service's drop file.
    pub fn position_file(&self) -> PathBuf {
        self.root.join("position.json")
    }

    /// Path to the local position ledger database.
    pub fn ledger_db(&self) -> PathBuf {
        self.root.join("agent").join("ledger.db")
    }

    /// Directory for CLI log files.
    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_hang_off_injected_root() {
        let storage = StorageConfig::with_root(PathBuf::from("/tmp/ft-test"));
        assert_eq!(storage.session_file(), Path::new("/tmp/ft-test/session.json"));
        assert_eq!(
            storage.ledger_db(),
            Path::new("/tmp/ft-test/agent/ledger.db")
        );
        assert_eq!(storage.config_file(), Path::new("/tmp/ft-test/agent.toml"));
    }
}
