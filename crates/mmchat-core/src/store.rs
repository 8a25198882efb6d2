//! Durable key-value storage for the chat history.
//!
//! The whole [`ChatHistory`] lives under one key ([`HISTORY_KEY`]) as JSON.
//! There is no schema version: a record that does not parse is discarded.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use mmchat_types::ChatHistory;

/// Key the serialized chat history is stored under.
pub const HISTORY_KEY: &str = "chatHistory";

/// Persistence port used by the session controller.
pub trait KeyValueStore {
    /// Reads the value stored under `key`, `None` when absent.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    /// Returns an error if the backing storage cannot be written.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Outcome of reading the persisted history.
#[derive(Debug)]
pub enum LoadedHistory {
    /// A parsed, non-empty history.
    Restored(ChatHistory),
    /// Nothing usable was stored (absent or an empty mapping).
    Empty,
    /// The record exists but could not be read or parsed.
    Unreadable(anyhow::Error),
}

/// Reads and parses the history record.
pub fn load_history<S: KeyValueStore + ?Sized>(store: &S) -> LoadedHistory {
    let raw = match store.get(HISTORY_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return LoadedHistory::Empty,
        Err(e) => return LoadedHistory::Unreadable(e),
    };

    match serde_json::from_str::<ChatHistory>(&raw) {
        Ok(history) if history.is_empty() => LoadedHistory::Empty,
        Ok(history) => LoadedHistory::Restored(history),
        Err(e) => LoadedHistory::Unreadable(
            anyhow::Error::new(e).context("Failed to parse stored chat history"),
        ),
    }
}

/// Serializes and writes the whole history record.
///
/// # Errors
/// Returns an error if serialization or the write fails.
pub fn save_history<S: KeyValueStore + ?Sized>(store: &S, history: &ChatHistory) -> Result<()> {
    let json = serde_json::to_string(history).context("Failed to serialize chat history")?;
    store.set(HISTORY_KEY, &json)
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// File store rooted at the mmchat home directory.
    pub fn in_home() -> Self {
        Self::new(crate::config::paths::data_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(contents))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create directory {}", self.dir.display()))?;

        let path = self.path_for(key);
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    fail_writes: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with one record.
    pub fn with_entry(key: &str, value: impl Into<String>) -> Self {
        let store = Self::new();
        store.lock().insert(key.to_string(), value.into());
        store
    }

    /// Store whose writes always fail.
    pub fn failing_writes() -> Self {
        Self {
            entries: Mutex::default(),
            fail_writes: true,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.fail_writes {
            anyhow::bail!("Storage is read-only");
        }
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
