//! Durable client storage for the session.
//!
//! The token and the identity snapshot are one document: they are written
//! together and removed together, never independently.

use crate::error::SessionStoreError;
use crate::session::Session;
use parking_lot::Mutex;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Persists the single client session.
pub trait SessionStore: Send + Sync {
    /// Returns the persisted session, if any.
    fn load(&self) -> Result<Option<Session>, SessionStoreError>;

    /// Replaces the persisted session.
    fn persist(&self, session: &Session) -> Result<(), SessionStoreError>;

    /// Removes the persisted session. Removing nothing is not an error.
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Session stored as a JSON document on disk.
///
/// Writes go to a temp file in the same directory, then are renamed over
/// the target.
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, e: impl std::fmt::Display) -> SessionStoreError {
        SessionStoreError::Io {
            location: self.path.display().to_string(),
            reason: e.to_string(),
        }
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SessionStoreError::Corrupt {
                reason: e.to_string(),
            })
    }

    fn persist(&self, session: &Session) -> Result<(), SessionStoreError> {
        let parent = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(|e| self.io_error(e))?;

        let document = serde_json::to_vec_pretty(session).map_err(|e| self.io_error(e))?;

        let mut temp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| self.io_error(e))?;
        temp.write_all(&document).map_err(|e| self.io_error(e))?;
        temp.persist(&self.path).map_err(|e| self.io_error(e.error))?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to remove session file");
                Err(self.io_error(e))
            }
        }
    }
}

/// In-process session storage.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds a session.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            slot: Mutex::new(Some(session)),
        }
    }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        Ok(self.slot.lock().clone())
    }

    fn persist(&self, session: &Session) -> Result<(), SessionStoreError> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::role::Role;
    use crate::session::AccessToken;
    use ilm_core::UserId;

    fn session() -> Session {
        Session::new(
            Identity::new(
                UserId::new("u-1").expect("valid"),
                "Alice".to_string(),
                "alice@example.com".to_string(),
                Role::Intern,
            ),
            AccessToken::new("tok-1"),
        )
    }

    #[test]
    fn file_store_missing_file_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::new(dir.path().join("session.json"));
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn file_store_persists_and_clears_both_keys() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("session.json");
        let store = FileSessionStore::new(&path);

        let session = session();
        store.persist(&session).expect("persist");

        let raw = std::fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&raw).expect("json");
        assert_eq!(value["ilm_token"], "tok-1");
        assert_eq!(value["ilm_user"]["email"], "alice@example.com");

        assert_eq!(store.load().expect("load"), Some(session));

        store.clear().expect("clear");
        assert!(!path.exists());
        assert_eq!(store.load().expect("load"), None);
    }

    #[test]
    fn file_store_clear_without_file_is_ok() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FileSessionStore::new(dir.path().join("session.json"));
        store.clear().expect("clear");
    }

    #[test]
    fn file_store_reports_corrupt_document() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        std::fs::write(&path, "{\"ilm_token\": \"tok\"}").expect("write");

        let store = FileSessionStore::new(&path);
        assert!(matches!(
            store.load(),
            Err(SessionStoreError::Corrupt { .. })
        ));
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = MemorySessionStore::new();
        assert_eq!(store.load().expect("load"), None);
        store.persist(&session()).expect("persist");
        assert!(store.load().expect("load").is_some());
        store.clear().expect("clear");
        assert_eq!(store.load().expect("load"), None);
    }
}
