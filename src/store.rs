//! Persistent win log: one JSON file, loaded and rewritten whole on every
//! mutation.
//!
//! `WinStore` is the storage port (`load`/`save`); `FileStore` is the
//! production backend, writing the entire log pretty-printed so the file stays
//! hand-readable. `WinLedger` serializes every load→mutate→save under a single
//! mutex so concurrent slash commands cannot drop each other's appends.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Wall-clock stamp format used for every record (local time).
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// A single logged win. Immutable once appended.
///
/// `channel_id` and `user_name` are whatever the slash command carried; they
/// serialize as `null` when absent so the on-disk shape stays stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinRecord {
    pub message: String,
    pub timestamp: String,
    pub channel_id: Option<String>,
    pub user_name: Option<String>,
}

impl WinRecord {
    /// Build a record stamped with the current local clock.
    pub fn logged_now(
        message: String,
        channel_id: Option<String>,
        user_name: Option<String>,
    ) -> Self {
        Self {
            message,
            timestamp: chrono::Local::now().format(TIMESTAMP_FORMAT).to_string(),
            channel_id,
            user_name,
        }
    }
}

/// User id → append-only win sequence. A key exists iff at least one win has
/// been logged for that user; insertion order within a sequence is
/// chronological because records are only ever appended.
pub type WinLog = HashMap<String, Vec<WinRecord>>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("win log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("win log is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Storage port. Production loads and rewrites a single file; tests substitute
/// an in-memory fake.
pub trait WinStore: Send + Sync {
    fn load(&self) -> Result<WinLog, StoreError>;
    fn save(&self, log: &WinLog) -> Result<(), StoreError>;
}

// ── File backend ──────────────────────────────────────────────────────────────

/// File-backed store. The whole log is one pretty-printed JSON object,
/// rewritten in full on every save.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Open the store at `path`, seeding an empty `{}` log if the file does
    /// not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self { path: path.into() };
        if !store.path.exists() {
            store.save(&WinLog::new())?;
            tracing::info!("store: created empty win log at {}", store.path.display());
        }
        Ok(store)
    }
}

impl WinStore for FileStore {
    fn load(&self) -> Result<WinLog, StoreError> {
        let raw = std::fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, log: &WinLog) -> Result<(), StoreError> {
        let raw = serde_json::to_string_pretty(log)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

// ── Ledger ────────────────────────────────────────────────────────────────────

/// Mutation gate over a `WinStore`.
///
/// The backing store has no transactions: every mutation is load → mutate →
/// save, and two interleaved sequences would silently drop one append. The
/// ledger closes that race by holding one mutex across the whole sequence.
/// The lock is never held across network I/O; callers that notify work from
/// a `snapshot()`.
pub struct WinLedger {
    store: Mutex<Box<dyn WinStore>>,
}

impl WinLedger {
    pub fn new(store: Box<dyn WinStore>) -> Self {
        Self {
            store: Mutex::new(store),
        }
    }

    /// Append one record to `user_id`'s sequence, creating the key on first
    /// use. The store file is left untouched if the load fails.
    pub fn append(&self, user_id: &str, record: WinRecord) -> Result<(), StoreError> {
        let store = self.store.lock();
        let mut log = store.load()?;
        log.entry(user_id.to_string()).or_default().push(record);
        store.save(&log)
    }

    /// Current contents of the whole log.
    pub fn snapshot(&self) -> Result<WinLog, StoreError> {
        self.store.lock().load()
    }
}

// ── Test doubles ──────────────────────────────────────────────────────────────

/// In-memory store for tests that do not care about files.
#[cfg(test)]
pub(crate) struct MemoryStore {
    log: Mutex<WinLog>,
}

#[cfg(test)]
impl MemoryStore {
    pub(crate) fn new() -> Self {
        Self {
            log: Mutex::new(WinLog::new()),
        }
    }

    pub(crate) fn with_log(log: WinLog) -> Self {
        Self {
            log: Mutex::new(log),
        }
    }
}

#[cfg(test)]
impl WinStore for MemoryStore {
    fn load(&self) -> Result<WinLog, StoreError> {
        Ok(self.log.lock().clone())
    }

    fn save(&self, log: &WinLog) -> Result<(), StoreError> {
        *self.log.lock() = log.clone();
        Ok(())
    }
}

/// Store whose every operation fails, for exercising the 500 paths.
#[cfg(test)]
pub(crate) struct BrokenStore;

#[cfg(test)]
impl WinStore for BrokenStore {
    fn load(&self) -> Result<WinLog, StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk offline")))
    }

    fn save(&self, _log: &WinLog) -> Result<(), StoreError> {
        Err(StoreError::Io(std::io::Error::other("disk offline")))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
