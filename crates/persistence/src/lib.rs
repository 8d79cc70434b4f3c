#![deny(warnings)]

//! Persistence adapter: a minimal key-value contract with in-memory and
//! JSON-file backends, plus typed accessors for the two keys the game
//! actually persists (last-seen timestamp and the custom question set).
//!
//! Storage is best-effort: corrupt or unparsable values read back as
//! absent rather than failing the session.

use chrono::{DateTime, Utc};
use clicker_core::QuestionSet;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// Key holding the epoch-milliseconds timestamp of the last active moment.
pub const KEY_LAST_TIMESTAMP: &str = "lastTimestamp";
/// Key holding the operator-authored question set as JSON.
pub const KEY_CUSTOM_QUESTIONS: &str = "customQuestions";

/// Errors from the storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serde(String),
}

/// Minimal durable key-value contract the core consumes.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// Volatile backend for tests and headless runs.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// File backend: one JSON object per save file, loaded on open and written
/// through on every mutation.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open (or create) a store at `path`. A missing file starts empty; a
    /// corrupt file also starts empty, with a warning, so one bad write
    /// never bricks the save.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str(&text) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "corrupt save file, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(JsonFileStore { path, entries })
    }

    fn flush(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let text = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| StoreError::Serde(e.to_string()))?;
        fs::write(&self.path, text)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Typed view over a key-value store for the game's persisted profile.
#[derive(Debug)]
pub struct Profile<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> Profile<S> {
    pub fn new(store: S) -> Self {
        Profile { store }
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Last-seen timestamp, if one was recorded and parses. Unparsable
    /// values read as absent.
    pub fn last_timestamp(&self) -> Result<Option<DateTime<Utc>>, StoreError> {
        let Some(raw) = self.store.get(KEY_LAST_TIMESTAMP)? else {
            return Ok(None);
        };
        let parsed = raw
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis);
        if parsed.is_none() {
            warn!(raw, "ignoring unparsable last-seen timestamp");
        }
        Ok(parsed)
    }

    /// Record `now` as the last-seen moment (epoch milliseconds).
    pub fn set_last_timestamp(&mut self, now: DateTime<Utc>) -> Result<(), StoreError> {
        self.store
            .set(KEY_LAST_TIMESTAMP, &now.timestamp_millis().to_string())
    }

    /// Forget the last-seen moment, e.g. after crediting offline earnings.
    pub fn clear_last_timestamp(&mut self) -> Result<(), StoreError> {
        self.store.remove(KEY_LAST_TIMESTAMP)
    }

    /// The persisted custom question set, shape-validated on read. Invalid
    /// payloads read as absent and are never partially installed.
    pub fn custom_questions(&self) -> Result<Option<QuestionSet>, StoreError> {
        let Some(raw) = self.store.get(KEY_CUSTOM_QUESTIONS)? else {
            return Ok(None);
        };
        match QuestionSet::from_json(&raw) {
            Ok(set) => Ok(Some(set)),
            Err(e) => {
                warn!(error = %e, "ignoring invalid persisted question set");
                Ok(None)
            }
        }
    }

    /// Persist the operator-authored question set.
    pub fn set_custom_questions(&mut self, set: &QuestionSet) -> Result<(), StoreError> {
        self.store.set(KEY_CUSTOM_QUESTIONS, &set.to_json())
    }
}
