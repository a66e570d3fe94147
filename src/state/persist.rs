//! Durable local storage.
//!
//! Only the participant profile and the recent-room list survive a
//! restart. Room, ledger, feed and phase are live mirrors and are never
//! written here.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{EngineError, Result};
use super::identity::Participant;
use super::recent::RecentRoom;

/// Key of the persisted session document.
pub const SESSION_KEY: &str = "session";

/// Key/value persistence backend.
pub trait SessionStore {
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, value: &str) -> Result<()>;
}

/// The persisted subset of session state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PersistedSession {
    pub user: Participant,
    pub recent_rooms: Vec<RecentRoom>,
}

impl PersistedSession {
    /// Read the session document. A missing document yields defaults.
    pub fn read(store: &dyn SessionStore) -> Result<Self> {
        match store.load(SESSION_KEY)? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| EngineError::Storage(format!("corrupt session document: {e}"))),
            None => Ok(Self::default()),
        }
    }

    pub fn write(&self, store: &mut dyn SessionStore) -> Result<()> {
        let raw = serde_json::to_string(self)
            .map_err(|e| EngineError::Storage(e.to_string()))?;
        store.save(SESSION_KEY, &raw)
    }
}

/// In-memory store, for tests and ephemeral sessions.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

impl SessionStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl SessionStore for FileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(EngineError::Storage(e.to_string())),
        }
    }

    fn save(&mut self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| EngineError::Storage(e.to_string()))?;
        let path = self.path_for(key);
        // Readers never observe a partially written document.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value).map_err(|e| EngineError::Storage(e.to_string()))?;
        fs::rename(&tmp, &path).map_err(|e| EngineError::Storage(e.to_string()))?;
        debug!(path = %path.display(), "persisted {key}");
        Ok(())
    }
}
