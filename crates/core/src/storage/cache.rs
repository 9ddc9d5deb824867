use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::errors::CoreError;
use crate::models::table::TimeSeriesTable;

use super::format;

/// A table as read from a store, plus when it was last written.
#[derive(Debug, Clone, Default)]
pub struct CachedTable {
    pub table: TimeSeriesTable,
    /// `None` when the store has no record (missing, unreadable or corrupt data).
    pub saved_at: Option<DateTime<Utc>>,
}

/// Durable home of the merged table between runs.
pub trait CacheStore: Send + Sync {
    /// Never fails: missing or corrupt data loads as an empty table.
    fn load(&self) -> CachedTable;

    /// Persist the whole table. No partial writes.
    fn save(&self, table: &TimeSeriesTable) -> Result<(), CoreError>;
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn load(&self) -> CachedTable {
        (**self).load()
    }

    fn save(&self, table: &TimeSeriesTable) -> Result<(), CoreError> {
        (**self).save(table)
    }
}

/// JSON file on disk. The file modification time doubles as the refresh timestamp.
#[derive(Debug, Clone)]
pub struct JsonFileCache {
    path: PathBuf,
}

impl JsonFileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<CachedTable, CoreError> {
        let bytes = std::fs::read(&self.path)?;
        let table = format::decode(&bytes)?;
        let saved_at = std::fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);
        Ok(CachedTable { table, saved_at })
    }
}

impl CacheStore for JsonFileCache {
    fn load(&self) -> CachedTable {
        if !self.path.is_file() {
            tracing::info!(path = %self.path.display(), "no cache file, starting empty");
            return CachedTable::default();
        }
        match self.read() {
            Ok(cached) => {
                tracing::debug!(path = %self.path.display(), rows = cached.table.len(), "cache loaded");
                cached
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cache unreadable, starting empty");
                CachedTable::default()
            }
        }
    }

    fn save(&self, table: &TimeSeriesTable) -> Result<(), CoreError> {
        let bytes = format::encode(table)?;
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }

        // Write next to the target, then swap in.
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        if let Err(e) = std::fs::write(&tmp, &bytes).and_then(|()| std::fs::rename(&tmp, &self.path)) {
            if let Err(cleanup) = std::fs::remove_file(&tmp) {
                tracing::debug!(path = %tmp.display(), error = %cleanup, "temp file not removed");
            }
            return Err(e.into());
        }

        tracing::debug!(path = %self.path.display(), rows = table.len(), "cache saved");
        Ok(())
    }
}

/// In-memory store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryCache {
    state: Mutex<MemoryState>,
}

#[derive(Debug, Default)]
struct MemoryState {
    cached: CachedTable,
    saves: usize,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a table as if it had been saved at `saved_at`.
    pub fn with_table(table: TimeSeriesTable, saved_at: Option<DateTime<Utc>>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                cached: CachedTable { table, saved_at },
                saves: 0,
            }),
        }
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.state.lock().map(|s| s.saves).unwrap_or(0)
    }

    pub fn snapshot(&self) -> CachedTable {
        self.state.lock().map(|s| s.cached.clone()).unwrap_or_default()
    }
}

impl CacheStore for MemoryCache {
    fn load(&self) -> CachedTable {
        self.snapshot()
    }

    fn save(&self, table: &TimeSeriesTable) -> Result<(), CoreError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CoreError::FileIO("memory cache lock poisoned".into()))?;
        state.cached = CachedTable {
            table: table.clone(),
            saved_at: Some(Utc::now()),
        };
        state.saves += 1;
        Ok(())
    }
}
