//! File-backed store for persistent storage.
//!
//! Layout of a store directory:
//!
//! ```text
//! <store_path>/
//! ├─ LOCK              # Advisory lock for single-writer
//! └─ store.json        # All keys and values as one JSON object
//! ```

use crate::error::{StorageError, StorageResult};
use crate::store::KvStore;
use fs2::FileExt;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const LOCK_FILE: &str = "LOCK";
const DATA_FILE: &str = "store.json";
const DATA_TEMP: &str = "store.json.tmp";

/// A file-backed key-value store.
///
/// Every successful write is durable before it returns: the whole map is
/// written to a temporary file, synced, and renamed over `store.json`.
/// Data survives process restarts.
///
/// # Thread Safety
///
/// The store holds an exclusive lock on its directory for its lifetime, so
/// only one process can open it at a time. Within the process it can be
/// shared across threads.
///
/// # Example
///
/// ```no_run
/// use heartguard_storage::{KvStore, FileStore};
/// use std::path::Path;
///
/// let store = FileStore::open(Path::new("offline-data")).unwrap();
/// store.set_item("pendingMutations", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    items: RwLock<BTreeMap<String, String>>,
    _lock_file: File,
}

impl FileStore {
    /// Opens or creates a store in the directory at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the lock (returns `Locked`)
    /// - `store.json` exists but is not a JSON object of strings
    pub fn open(path: &Path) -> StorageResult<Self> {
        fs::create_dir_all(path)?;

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked(path.display().to_string()));
        }

        let items = load_items(&path.join(DATA_FILE))?;
        debug!(path = %path.display(), keys = items.len(), "opened file store");

        Ok(Self {
            path: path.to_path_buf(),
            items: RwLock::new(items),
            _lock_file: lock_file,
        })
    }

    /// Returns the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the whole map using write-then-rename.
    fn persist(&self, items: &BTreeMap<String, String>) -> StorageResult<()> {
        let temp_path = self.path.join(DATA_TEMP);
        let data = serde_json::to_vec(items)
            .map_err(|e| StorageError::Corrupted(format!("failed to encode store: {e}")))?;

        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, self.path.join(DATA_FILE))?;
        self.sync_directory()
    }

    #[cfg(unix)]
    fn sync_directory(&self) -> StorageResult<()> {
        File::open(&self.path)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_directory(&self) -> StorageResult<()> {
        Ok(())
    }
}

fn load_items(data_path: &Path) -> StorageResult<BTreeMap<String, String>> {
    if !data_path.exists() {
        return Ok(BTreeMap::new());
    }

    let data = fs::read(data_path)?;
    if data.is_empty() {
        return Ok(BTreeMap::new());
    }

    serde_json::from_slice(&data).map_err(|e| {
        StorageError::Corrupted(format!("{}: {e}", data_path.display()))
    })
}

impl KvStore for FileStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        let mut items = self.items.write();
        let previous = items.insert(key.to_string(), value.to_string());

        if let Err(e) = self.persist(&items) {
            match previous {
                Some(old) => items.insert(key.to_string(), old),
                None => items.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        let mut items = self.items.write();
        let Some(previous) = items.remove(key) else {
            return Ok(());
        };

        if let Err(e) = self.persist(&items) {
            items.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn size(&self) -> StorageResult<usize> {
        Ok(self.items.read().iter().map(|(k, v)| k.len() + v.len()).sum())
    }
}
