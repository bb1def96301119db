use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CoreError, Result};

pub const HISTORY_CAPACITY: usize = 10;
pub const HISTORY_KEY: &str = "lifecycle_history";
pub const APP_DIR: &str = "lifecycle-tracker";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub query: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Most-recent-first list of past queries, unique by case-insensitive text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HistoryList {
    entries: Vec<HistoryEntry>,
}

impl HistoryList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops later duplicates and anything past capacity.
    pub fn from_entries(entries: Vec<HistoryEntry>) -> Self {
        let mut list = Self::new();
        for entry in entries {
            if list.entries.len() == HISTORY_CAPACITY {
                break;
            }
            if list.position(&entry.query).is_none() {
                list.entries.push(entry);
            }
        }
        list
    }

    /// Evicts any entry with the same normalized query, then prepends.
    pub fn upsert(&mut self, query: impl Into<String>, timestamp: i64) {
        let query = query.into();
        if let Some(idx) = self.position(&query) {
            self.entries.remove(idx);
        }
        self.entries.insert(0, HistoryEntry { query, timestamp });
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&HistoryEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, query: &str) -> Option<usize> {
        let normalized = normalize(query);
        self.entries
            .iter()
            .position(|entry| normalize(&entry.query) == normalized)
    }
}

fn normalize(query: &str) -> String {
    query.to_lowercase()
}

/// A single durable string-keyed value.
pub trait Slot {
    fn read(&self) -> Result<Option<String>>;
    fn write(&self, value: &str) -> Result<()>;
    fn remove(&self) -> Result<()>;
}

/// Slot stored as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileSlot {
    path: PathBuf,
}

impl FileSlot {
    pub fn new(dir: impl AsRef<Path>, key: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("{key}.json")),
        }
    }

    /// `<data dir>/lifecycle-tracker/lifecycle_history.json`.
    pub fn default_history() -> Result<Self> {
        let dir = dirs::data_dir().ok_or(CoreError::NoDataDir)?.join(APP_DIR);
        Ok(Self::new(dir, HISTORY_KEY))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Slot for FileSlot {
    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(raw) => Ok(Some(raw)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, value: &str) -> Result<()> {
        let persist = |source: std::io::Error| CoreError::Persist {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(persist)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut file = fs::File::create(&tmp).map_err(persist)?;
        file.write_all(value.as_bytes()).map_err(persist)?;
        file.sync_all().map_err(persist)?;
        fs::rename(&tmp, &self.path).map_err(persist)?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// In-process slot map, keyed like the file slots.
#[derive(Debug, Default)]
pub struct MemorySlot {
    key: String,
    values: Mutex<HashMap<String, String>>,
}

impl MemorySlot {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            values: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_value(key: impl Into<String>, value: impl Into<String>) -> Self {
        let slot = Self::new(key);
        slot.lock().insert(slot.key.clone(), value.into());
        slot
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.values.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Slot for MemorySlot {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.lock().get(&self.key).cloned())
    }

    fn write(&self, value: &str) -> Result<()> {
        self.lock().insert(self.key.clone(), value.to_string());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        self.lock().remove(&self.key);
        Ok(())
    }
}

/// Loads and persists the search history in one slot.
#[derive(Debug)]
pub struct HistoryStore<S> {
    slot: S,
}

impl<S: Slot> HistoryStore<S> {
    pub fn new(slot: S) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    /// Best effort: unreadable or malformed data yields an empty list.
    pub fn load(&self) -> HistoryList {
        let raw = match self.slot.read() {
            Ok(Some(raw)) => raw,
            Ok(None) => return HistoryList::new(),
            Err(err) => {
                warn!(error = %err, "failed to read search history");
                return HistoryList::new();
            }
        };
        match serde_json::from_str::<Vec<HistoryEntry>>(&raw) {
            Ok(entries) => {
                let list = HistoryList::from_entries(entries);
                debug!(entries = list.len(), "loaded search history");
                list
            }
            Err(err) => {
                warn!(error = %err, "failed to parse search history");
                HistoryList::new()
            }
        }
    }

    pub fn save(&self, history: &HistoryList) -> Result<()> {
        let raw = serde_json::to_string(history)?;
        self.slot.write(&raw)
    }

    pub fn clear(&self) -> Result<()> {
        self.slot.remove()
    }
}
