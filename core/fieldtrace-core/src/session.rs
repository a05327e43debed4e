//! Persistent session store.
//!
//! The authenticated identity (auth token, user id, user name) lives in a
//! single file under the storage root. Disk is the only source of truth: the
//! background tracker re-reads this store at every invocation instead of
//! trusting anything captured in memory, so a process restart cannot strand
//! fixes without identity.
//!
//! All three fields are written atomically (temp file + rename) and cleared
//! together. A file holding a partial identity loads as `None`.

use fs_err as fs;
use tracing::warn;

use fieldtrace_protocol::Session;

use crate::error::{Result, TrackError};
use crate::storage::StorageConfig;

#[derive(Debug, Clone)]
pub struct SessionStore {
    storage: StorageConfig,
}

impl SessionStore {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }

    /// Loads the persisted session, returning `Some` only when all three
    /// fields are present. Missing file, malformed JSON, and partial
    /// identities all read as "not logged in".
    pub fn load(&self) -> Option<Session> {
        let path = self.storage.session_file();
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(error = %err, "Failed to read session file");
                return None;
            }
        };

        let session: Session = match serde_json::from_str(&data) {
            Ok(session) => session,
            Err(err) => {
                warn!(error = %err, "Session file malformed; treating as logged out");
                return None;
            }
        };

        if !session.is_complete() {
            warn!("Session file incomplete; treating as logged out");
            return None;
        }

        Some(session)
    }

    /// Persists the session atomically with owner-only permissions.
    pub fn save(&self, session: &Session) -> Result<()> {
        let path = self.storage.session_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| TrackError::Io {
                context: "creating session directory".to_string(),
                source,
            })?;
        }

        let content = serde_json::to_string_pretty(session).map_err(|source| TrackError::Json {
            context: "serializing session".to_string(),
            source,
        })?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, content).map_err(|source| TrackError::Io {
            context: "writing session file".to_string(),
            source,
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600)).map_err(
                |source| TrackError::Io {
                    context: "restricting session file permissions".to_string(),
                    source,
                },
            )?;
        }

        fs::rename(&tmp, &path).map_err(|source| TrackError::Io {
            context: "committing session file".to_string(),
            source,
        })
    }

    /// Removes the session file; all three fields disappear together.
    /// Clearing an already-absent session is a no-op.
    pub fn clear(&self) -> Result<()> {
        let path = self.storage.session_file();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(TrackError::Io {
                context: "removing session file".to_string(),
                source,
            }),
        }
    }
}
