//! Persisted "collected" flags keyed by item name.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TrackerError};

/// Item name -> collected.
pub type Snapshot = BTreeMap<String, bool>;

/// A persisted boolean mapping. Every write replaces the whole snapshot.
pub trait StateStore {
    /// Absent keys read as `false`.
    fn get(&self, key: &str) -> bool;
    fn set(&mut self, key: &str, value: bool) -> Result<()>;
    fn load_all(&self) -> &Snapshot;
    fn replace_all(&mut self, snapshot: Snapshot) -> Result<()>;
}

/// Non-persistent store, for tests and sessions without a state file.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    data: Snapshot,
}

impl MemoryStore {
    pub fn new(data: Snapshot) -> Self {
        Self { data }
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> bool {
        self.data.get(key).copied().unwrap_or(false)
    }

    fn set(&mut self, key: &str, value: bool) -> Result<()> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    fn load_all(&self) -> &Snapshot {
        &self.data
    }

    fn replace_all(&mut self, snapshot: Snapshot) -> Result<()> {
        self.data = snapshot;
        Ok(())
    }
}

/// JSON file store. The file is created as `{}` on first open and rewritten
/// only when a value actually changes.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    data: Snapshot,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            let store = Self {
                path,
                data: Snapshot::new(),
            };
            store.persist()?;
            info!(path = %store.path.display(), "created empty state store");
            return Ok(store);
        }

        let text = fs::read_to_string(&path).map_err(|source| TrackerError::Read {
            path: path.clone(),
            source,
        })?;
        let data = serde_json::from_str(&text).map_err(|source| TrackerError::Store {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, data })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        write_snapshot(&self.path, &self.data)
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> bool {
        self.data.get(key).copied().unwrap_or(false)
    }

    /// A failed write restores the previous value, so memory never runs
    /// ahead of the file.
    fn set(&mut self, key: &str, value: bool) -> Result<()> {
        let previous = self.data.insert(key.to_string(), value);
        if previous == Some(value) {
            return Ok(());
        }
        debug!(key, value, "persisting state");
        if let Err(err) = self.persist() {
            match previous {
                Some(old) => self.data.insert(key.to_string(), old),
                None => self.data.remove(key),
            };
            return Err(err);
        }
        Ok(())
    }

    fn load_all(&self) -> &Snapshot {
        &self.data
    }

    fn replace_all(&mut self, snapshot: Snapshot) -> Result<()> {
        write_snapshot(&self.path, &snapshot)?;
        self.data = snapshot;
        Ok(())
    }
}

fn write_snapshot(path: &Path, snapshot: &Snapshot) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| TrackerError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let text = serde_json::to_string(snapshot)?;
    fs::write(path, text).map_err(|source| TrackerError::Write {
        path: path.to_path_buf(),
        source,
    })
}

/// Write the full snapshot to a user-chosen file.
pub fn download<S: StateStore>(store: &S, path: &Path) -> Result<()> {
    write_snapshot(path, store.load_all())?;
    info!(path = %path.display(), entries = store.load_all().len(), "exported state");
    Ok(())
}

/// Parse a user-supplied snapshot and replace the store with it. The file is
/// parsed completely before anything is written, so a bad file leaves the
/// store untouched.
pub fn upload<S: StateStore>(store: &mut S, path: &Path) -> Result<usize> {
    let text = fs::read_to_string(path).map_err(|source| TrackerError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let snapshot: Snapshot = serde_json::from_str(&text).map_err(|source| TrackerError::Snapshot {
        path: path.to_path_buf(),
        source,
    })?;
    let entries = snapshot.len();
    store.replace_all(snapshot)?;
    info!(path = %path.display(), entries, "imported state");
    Ok(entries)
}
