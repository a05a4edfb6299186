//! Durable storage for the session list.
//!
//! A backend stores one ordered session list per storage key and always
//! receives the complete list; there is no partial write path.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use agent_chat::ChatSession;
use serde_json::{Map, Value};

use crate::error::SessionStoreError;
use crate::paths::temp_file_for;

pub trait SessionBackend: Send {
    /// Returns the list stored under `key`, or `None` when nothing was stored yet.
    fn load(&self, key: &str) -> Result<Option<Vec<ChatSession>>, SessionStoreError>;

    /// Replaces the list stored under `key`.
    fn persist(&mut self, key: &str, sessions: &[ChatSession]) -> Result<(), SessionStoreError>;
}

/// Stores lists as keys of a single JSON object document.
///
/// Keys owned by other components are preserved on every write. Writes go to a
/// sibling temp file which is then renamed over the document.
#[derive(Debug, Clone)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Option<Map<String, Value>>, SessionStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(None),
            Err(error) => {
                return Err(SessionStoreError::io(
                    "reading session data",
                    &self.path,
                    error,
                ))
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }

        serde_json::from_str::<Map<String, Value>>(&raw)
            .map(Some)
            .map_err(|source| SessionStoreError::json_parse(&self.path, source))
    }
}

impl SessionBackend for JsonFileBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<ChatSession>>, SessionStoreError> {
        let Some(mut document) = self.read_document()? else {
            return Ok(None);
        };
        let Some(stored) = document.remove(key) else {
            return Ok(None);
        };

        serde_json::from_value::<Vec<ChatSession>>(stored)
            .map(Some)
            .map_err(|source| SessionStoreError::json_parse(&self.path, source))
    }

    fn persist(&mut self, key: &str, sessions: &[ChatSession]) -> Result<(), SessionStoreError> {
        let mut document = self.read_document()?.unwrap_or_default();
        let encoded = serde_json::to_value(sessions)
            .map_err(|source| SessionStoreError::json_serialize(&self.path, source))?;
        document.insert(key.to_string(), encoded);
        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|source| SessionStoreError::json_serialize(&self.path, source))?;

        if let Some(parent) = self
            .path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            fs::create_dir_all(parent).map_err(|source| {
                SessionStoreError::io("creating session data directory", parent, source)
            })?;
        }

        let temp_path = temp_file_for(&self.path);
        fs::write(&temp_path, bytes).map_err(|source| {
            SessionStoreError::io("writing session data", &temp_path, source)
        })?;
        fs::rename(&temp_path, &self.path).map_err(|source| {
            SessionStoreError::io("replacing session data", &self.path, source)
        })?;

        tracing::debug!(
            path = %self.path.display(),
            key,
            sessions = sessions.len(),
            "persisted session list"
        );
        Ok(())
    }
}

/// In-process backend. Clones share the same storage, so a test can keep a
/// handle to inspect what a store wrote.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    lists: HashMap<String, Vec<ChatSession>>,
    loads: usize,
    writes: usize,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend pre-populated with `sessions` under `key`.
    #[must_use]
    pub fn with_sessions(key: &str, sessions: Vec<ChatSession>) -> Self {
        let backend = Self::default();
        lock_unpoisoned(&backend.state)
            .lists
            .insert(key.to_string(), sessions);
        backend
    }

    #[must_use]
    pub fn stored(&self, key: &str) -> Option<Vec<ChatSession>> {
        lock_unpoisoned(&self.state).lists.get(key).cloned()
    }

    /// Number of `load` calls served.
    #[must_use]
    pub fn load_count(&self) -> usize {
        lock_unpoisoned(&self.state).loads
    }

    /// Number of `persist` calls served.
    #[must_use]
    pub fn write_count(&self) -> usize {
        lock_unpoisoned(&self.state).writes
    }
}

impl SessionBackend for MemoryBackend {
    fn load(&self, key: &str) -> Result<Option<Vec<ChatSession>>, SessionStoreError> {
        let mut state = lock_unpoisoned(&self.state);
        state.loads += 1;
        Ok(state.lists.get(key).cloned())
    }

    fn persist(&mut self, key: &str, sessions: &[ChatSession]) -> Result<(), SessionStoreError> {
        let mut state = lock_unpoisoned(&self.state);
        state.writes += 1;
        state.lists.insert(key.to_string(), sessions.to_vec());
        Ok(())
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_nothing_stored() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let backend = JsonFileBackend::new(dir.path().join("data.json"));

        assert!(backend
            .load("chatSessions")
            .expect("missing file is not an error")
            .is_none());
    }

    #[test]
    fn persist_creates_parent_directories_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("nested").join("data.json");
        let mut backend = JsonFileBackend::new(&path);

        backend
            .persist("chatSessions", &[ChatSession::new("s-1", 1)])
            .expect("persist should succeed");

        assert!(path.exists());
        assert!(!temp_file_for(&path).exists());
        let loaded = backend
            .load("chatSessions")
            .expect("load should succeed")
            .expect("list should be stored");
        assert_eq!(loaded[0].id, "s-1");
    }

    #[test]
    fn malformed_document_reports_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("data.json");
        fs::write(&path, "{ not json").expect("fixture should be written");

        let error = JsonFileBackend::new(&path)
            .load("chatSessions")
            .expect_err("malformed JSON must fail");
        assert!(matches!(error, SessionStoreError::JsonParse { .. }));
    }
}
