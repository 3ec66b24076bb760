//! In-memory store for testing and ephemeral sessions.

use crate::error::{StorageError, StorageResult};
use crate::store::KvStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// An in-memory key-value store.
///
/// This store keeps everything in memory and is suitable for:
/// - Unit and integration tests
/// - Sessions that don't need to survive a restart
///
/// A quota can be set to reproduce a full browser store, and the store can
/// be closed to reproduce a disabled one.
///
/// # Example
///
/// ```rust
/// use heartguard_storage::{KvStore, InMemoryStore, StorageError};
///
/// let store = InMemoryStore::with_quota(8);
/// assert!(matches!(
///     store.set_item("key", "too long"),
///     Err(StorageError::QuotaExceeded { .. })
/// ));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStore {
    items: RwLock<BTreeMap<String, String>>,
    quota: Option<usize>,
    closed: AtomicBool,
}

impl InMemoryStore {
    /// Creates a new empty store with no quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new empty store limited to `quota` bytes of keys and values.
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Closes the store. Every later call fails with [`StorageError::Closed`].
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Reopens a closed store. Data written before closing is still there.
    pub fn reopen(&self) {
        self.closed.store(false, Ordering::SeqCst);
    }

    fn check_open(&self) -> StorageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StorageError::Closed)
        } else {
            Ok(())
        }
    }
}

fn total_size(items: &BTreeMap<String, String>) -> usize {
    items.iter().map(|(k, v)| k.len() + v.len()).sum()
}

impl KvStore for InMemoryStore {
    fn get_item(&self, key: &str) -> StorageResult<Option<String>> {
        self.check_open()?;
        Ok(self.items.read().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> StorageResult<()> {
        self.check_open()?;
        let mut items = self.items.write();

        if let Some(quota) = self.quota {
            let previous = items.get(key).map_or(0, |v| key.len() + v.len());
            let requested = total_size(&items) - previous + key.len() + value.len();
            if requested > quota {
                return Err(StorageError::QuotaExceeded { requested, quota });
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> StorageResult<()> {
        self.check_open()?;
        self.items.write().remove(key);
        Ok(())
    }

    fn size(&self) -> StorageResult<usize> {
        self.check_open()?;
        Ok(total_size(&self.items.read()))
    }
}
