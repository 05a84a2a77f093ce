//! Persisted named options.
//!
//! The licence table lives under a single option name. Stores are
//! read-modify-write without cross-process locking: one installation is
//! expected to have a single logical owner of its licence option.

use crate::error::{LicenceError, LicenceResult};
use crate::record::LicenceTable;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use tracing::debug;

/// Named option persistence.
pub trait OptionStore: Send + Sync {
    /// Returns the stored value, or `None` if the option was never set.
    fn get_option(&self, name: &str) -> LicenceResult<Option<Value>>;

    /// Stores a value, replacing any previous one.
    fn update_option(&self, name: &str, value: Value) -> LicenceResult<()>;
}

/// Reads the licence table stored under `option`.
///
/// A missing option, `null` or `false` is an empty table.
pub fn load_table(store: &dyn OptionStore, option: &str) -> LicenceResult<LicenceTable> {
    match store.get_option(option)? {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(LicenceTable::new()),
        Some(value) => Ok(serde_json::from_value(value)?),
    }
}

/// Writes the whole licence table under `option`.
pub fn save_table(store: &dyn OptionStore, option: &str, table: &LicenceTable) -> LicenceResult<()> {
    store.update_option(option, serde_json::to_value(table)?)
}

fn poisoned(_: impl std::fmt::Display) -> LicenceError {
    LicenceError::Storage("option store lock poisoned".into())
}

/// In-process option store.
#[derive(Debug, Default)]
pub struct MemoryOptionStore {
    options: RwLock<HashMap<String, Value>>,
}

impl MemoryOptionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl OptionStore for MemoryOptionStore {
    fn get_option(&self, name: &str) -> LicenceResult<Option<Value>> {
        Ok(self.options.read().map_err(poisoned)?.get(name).cloned())
    }

    fn update_option(&self, name: &str, value: Value) -> LicenceResult<()> {
        self.options
            .write()
            .map_err(poisoned)?
            .insert(name.to_string(), value);
        Ok(())
    }
}

/// Option store kept in a single JSON document on disk.
///
/// The document is loaded once when the store is opened and rewritten on
/// every update through a temporary file and a rename.
pub struct FileOptionStore {
    path: PathBuf,
    cache: RwLock<Map<String, Value>>,
}

impl FileOptionStore {
    /// Opens the store at `path`, creating parent directories as needed.
    /// A missing file is an empty store.
    pub fn open(path: impl AsRef<Path>) -> LicenceResult<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                LicenceError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let cache = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                LicenceError::Storage(format!("failed to read {}: {e}", path.display()))
            })?;
            if contents.trim().is_empty() {
                Map::new()
            } else {
                serde_json::from_str(&contents)?
            }
        } else {
            Map::new()
        };

        debug!(path = %path.display(), options = cache.len(), "Opened option store");
        Ok(Self {
            path,
            cache: RwLock::new(cache),
        })
    }

    /// Path of the backing JSON document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, options: &Map<String, Value>) -> LicenceResult<()> {
        let contents = serde_json::to_string_pretty(options)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents).map_err(|e| {
            LicenceError::Storage(format!("failed to write {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            LicenceError::Storage(format!("failed to replace {}: {e}", self.path.display()))
        })
    }
}

impl OptionStore for FileOptionStore {
    fn get_option(&self, name: &str) -> LicenceResult<Option<Value>> {
        Ok(self.cache.read().map_err(poisoned)?.get(name).cloned())
    }

    fn update_option(&self, name: &str, value: Value) -> LicenceResult<()> {
        let mut cache = self.cache.write().map_err(poisoned)?;
        let mut next = cache.clone();
        next.insert(name.to_string(), value);
        // The cache only ever mirrors what reached the disk.
        self.persist(&next)?;
        *cache = next;
        Ok(())
    }
}

impl std::fmt::Debug for FileOptionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileOptionStore")
            .field("path", &self.path)
            .finish()
    }
}
