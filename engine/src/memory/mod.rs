//! Persisted user memory
//!
//! A small, user-editable preference record that outlives any single
//! session. It is mutated only through explicit edits, persisted
//! synchronously, and an absent field means "unknown", never a negative
//! signal. The store must tolerate a missing or corrupt record by
//! defaulting to an empty Memory rather than failing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::warn;

use crate::errors::EngineError;

/// User-scoped preference record. The camelCase field names match the
/// record format the web client persisted, so existing exports stay
/// readable.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Memory {
    /// How the user wants to be addressed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_name: Option<String>,

    /// Words/phrases known to calm
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub calming_words: BTreeSet<String>,

    /// Words/phrases to avoid
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub avoid_words: BTreeSet<String>,

    /// Known sensory or situational triggers
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub known_triggers: BTreeSet<String>,
}

/// Simple get/set persistence for the memory record.
pub trait MemoryStore: Send + Sync {
    /// Load the record. Missing or corrupt data yields the default record.
    fn load(&self) -> Memory;

    /// Persist the record synchronously.
    fn store(&self, memory: &Memory) -> Result<(), EngineError>;
}

/// JSON-file-backed store, one record per file.
pub struct FileMemoryStore {
    path: PathBuf,
}

impl FileMemoryStore {
    /// Create a store at the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl MemoryStore for FileMemoryStore {
    fn load(&self) -> Memory {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Memory::default();
            }
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "memory record unreadable, using defaults");
                return Memory::default();
            }
        };

        match serde_json::from_str(&contents) {
            Ok(memory) => memory,
            Err(err) => {
                warn!(path = %self.path.display(), error = %err, "memory record corrupt, using defaults");
                Memory::default()
            }
        }
    }

    fn store(&self, memory: &Memory) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| EngineError::Memory(format!("cannot create {parent:?}: {e}")))?;
        }
        let json = serde_json::to_string_pretty(memory)
            .map_err(|e| EngineError::Memory(format!("serialization failed: {e}")))?;
        fs::write(&self.path, json)
            .map_err(|e| EngineError::Memory(format!("write failed: {e}")))?;
        Ok(())
    }
}

/// Mutex-guarded store for tests and embedded use.
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Memory>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemoryStore for InMemoryStore {
    fn load(&self) -> Memory {
        self.inner.lock().map(|m| m.clone()).unwrap_or_default()
    }

    fn store(&self, memory: &Memory) -> Result<(), EngineError> {
        match self.inner.lock() {
            Ok(mut guard) => {
                *guard = memory.clone();
                Ok(())
            }
            Err(_) => Err(EngineError::Memory("store mutex poisoned".to_string())),
        }
    }
}
