//! Key-value store trait definition.

use crate::error::StorageResult;

/// A persistent key-value store.
///
/// Stores are **opaque string maps**, modelled on browser-local storage.
/// Callers own the format of the values they write; stores never parse
/// them.
///
/// # Invariants
///
/// - `get_item` returns exactly the value last written by `set_item`
/// - A failed `set_item` leaves the previous value untouched
/// - `remove_item` on a missing key succeeds
/// - Stores must be `Send + Sync` for shared access
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::FileStore`] - For persistent storage
pub trait KvStore: Send + Sync {
    /// Reads the value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or cannot be read.
    fn get_item(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The store is closed
    /// - The write would exceed the store's quota
    /// - An I/O error occurs
    fn set_item(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes the value stored under `key`. Missing keys are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed or an I/O error occurs.
    fn remove_item(&self, key: &str) -> StorageResult<()>;

    /// Returns the total size in bytes of all keys and values.
    ///
    /// # Errors
    ///
    /// Returns an error if the store is closed.
    fn size(&self) -> StorageResult<usize>;
}
