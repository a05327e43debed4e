//! Permission & service gate.
//!
//! The OS location prompts belong to the platform shell, not this agent. The
//! shell records the user's answers (and the location-services toggle) in
//! `permissions.json` under the storage root; this module reads that file
//! into a tri-state readiness tuple. Undetermined and absent both read as
//! denied, and the lifecycle controller re-checks on every refresh, so
//! repeated checks are always safe.
//!
//! A denial is reported as-is; deciding what to do about it is the
//! controller's job.

use fs_err as fs;
use serde::{Deserialize, Serialize};
use tracing::warn;

use fieldtrace_protocol::Readiness;

use crate::storage::StorageConfig;

/// Decision state of a single permission as recorded by the platform shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    #[default]
    Undetermined,
    Granted,
    Denied,
}

impl PermissionState {
    fn granted(self) -> bool {
        self == PermissionState::Granted
    }
}

/// On-disk shape of the platform shell's permission record.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PermissionSnapshot {
    #[serde(default)]
    pub foreground: PermissionState,
    #[serde(default)]
    pub background: PermissionState,
    #[serde(default)]
    pub services_enabled: bool,
}

impl From<PermissionSnapshot> for Readiness {
    fn from(snapshot: PermissionSnapshot) -> Self {
        Readiness {
            foreground_granted: snapshot.foreground.granted(),
            background_granted: snapshot.background.granted(),
            services_enabled: snapshot.services_enabled,
        }
    }
}

/// Seam between the lifecycle controller and the platform permission state.
pub trait PermissionGate: Send {
    fn check_readiness(&self) -> Readiness;
}

/// Production gate backed by the platform shell's drop file.
#[derive(Debug, Clone)]
pub struct PlatformGate {
    storage: StorageConfig,
}

impl PlatformGate {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }
}

impl PermissionGate for PlatformGate {
    fn check_readiness(&self) -> Readiness {
        let path = self.storage.permissions_file();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Readiness::default();
            }
            Err(err) => {
                warn!(error = %err, "Failed to read permissions file");
                return Readiness::default();
            }
        };

        match serde_json::from_str::<PermissionSnapshot>(&data) {
            Ok(snapshot) => snapshot.into(),
            Err(err) => {
                warn!(error = %err, "Permissions file malformed; treating as denied");
                Readiness::default()
            }
        }
    }
}
