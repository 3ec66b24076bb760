//! Local durable queue of pending mutations and cached assets.

use crate::error::OfflineResult;
use crate::model::{now_millis, CachedAsset, HttpMethod, MutationId, PendingMutation};
use heartguard_storage::KvStore;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Store key holding the JSON array of pending mutations.
pub const PENDING_MUTATIONS_KEY: &str = "pendingMutations";
/// Store key holding the JSON object of cached assets, keyed by URL.
pub const CACHED_ASSETS_KEY: &str = "cachedAssets";

/// Persists pending mutations and cached assets in a [`KvStore`].
///
/// Mutations are kept as one JSON array so insertion order is the stored
/// order. Every method re-reads the store, so a queue reopened over the
/// same store sees what an earlier one wrote.
///
/// All writes go through this type; read-modify-write cycles are
/// serialized by an internal lock.
pub struct DurableQueue<S: KvStore> {
    store: Arc<S>,
    write_lock: Mutex<()>,
}

impl<S: KvStore> DurableQueue<S> {
    /// Creates a queue over `store`.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    /// Returns the bytes the store holds, keys included.
    pub fn storage_used(&self) -> OfflineResult<usize> {
        Ok(self.store.size()?)
    }

    /// Queues a mutation and returns its new ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be read or written.
    pub fn enqueue(
        &self,
        endpoint: &str,
        method: HttpMethod,
        payload: serde_json::Value,
    ) -> OfflineResult<MutationId> {
        let mutation = PendingMutation::new(endpoint, method, payload);
        let id = mutation.id;

        let _guard = self.write_lock.lock();
        let mut pending = self.load_pending()?;
        pending.push(mutation);
        self.save_pending(&pending)?;

        debug!(%id, %method, endpoint, queued = pending.len(), "mutation queued");
        Ok(id)
    }

    /// Removes the mutation with `id`. Returns false if it was not queued.
    pub fn dequeue(&self, id: MutationId) -> OfflineResult<bool> {
        let _guard = self.write_lock.lock();
        let mut pending = self.load_pending()?;
        let before = pending.len();
        pending.retain(|m| m.id != id);

        if pending.len() == before {
            return Ok(false);
        }
        self.save_pending(&pending)?;
        Ok(true)
    }

    /// Increments the attempt counter of the mutation with `id`.
    ///
    /// Returns the new count, or `None` if the mutation is no longer queued.
    pub fn record_failure(&self, id: MutationId) -> OfflineResult<Option<u32>> {
        let _guard = self.write_lock.lock();
        let mut pending = self.load_pending()?;

        let Some(mutation) = pending.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        mutation.sync_attempts = mutation.sync_attempts.saturating_add(1);
        let attempts = mutation.sync_attempts;

        self.save_pending(&pending)?;
        Ok(Some(attempts))
    }

    /// Returns all pending mutations in the order they were queued.
    pub fn list_pending(&self) -> OfflineResult<Vec<PendingMutation>> {
        self.load_pending()
    }

    /// Returns the pending mutation with `id`, if queued.
    pub fn get(&self, id: MutationId) -> OfflineResult<Option<PendingMutation>> {
        Ok(self.load_pending()?.into_iter().find(|m| m.id == id))
    }

    /// Returns the number of pending mutations.
    pub fn len(&self) -> OfflineResult<usize> {
        Ok(self.load_pending()?.len())
    }

    /// Returns true if no mutations are pending.
    pub fn is_empty(&self) -> OfflineResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Stores `content` for `url`, replacing any earlier entry.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the store cannot be read or written.
    pub fn cache_asset(&self, url: &str, content: &str) -> OfflineResult<()> {
        let _guard = self.write_lock.lock();
        let mut assets = self.load_assets()?;
        assets.insert(
            url.to_string(),
            CachedAsset {
                url: url.to_string(),
                content: content.to_string(),
                cached_at: now_millis(),
            },
        );
        self.save_assets(&assets)?;

        debug!(url, bytes = content.len(), "asset cached");
        Ok(())
    }

    /// Returns the cached content for `url`.
    pub fn get_cached_asset(&self, url: &str) -> OfflineResult<Option<String>> {
        Ok(self.cached_asset(url)?.map(|asset| asset.content))
    }

    /// Returns the full cache entry for `url`.
    pub fn cached_asset(&self, url: &str) -> OfflineResult<Option<CachedAsset>> {
        Ok(self.load_assets()?.remove(url))
    }

    /// Empties both pending mutations and cached assets.
    pub fn clear(&self) -> OfflineResult<()> {
        let _guard = self.write_lock.lock();
        self.store.remove_item(PENDING_MUTATIONS_KEY)?;
        self.store.remove_item(CACHED_ASSETS_KEY)?;
        debug!("offline queue cleared");
        Ok(())
    }

    fn load_pending(&self) -> OfflineResult<Vec<PendingMutation>> {
        match self.store.get_item(PENDING_MUTATIONS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    fn save_pending(&self, pending: &[PendingMutation]) -> OfflineResult<()> {
        let json = serde_json::to_string(pending)?;
        self.store.set_item(PENDING_MUTATIONS_KEY, &json)?;
        Ok(())
    }

    fn load_assets(&self) -> OfflineResult<BTreeMap<String, CachedAsset>> {
        match self.store.get_item(CACHED_ASSETS_KEY)? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(BTreeMap::new()),
        }
    }

    fn save_assets(&self, assets: &BTreeMap<String, CachedAsset>) -> OfflineResult<()> {
        let json = serde_json::to_string(assets)?;
        self.store.set_item(CACHED_ASSETS_KEY, &json)?;
        Ok(())
    }
}
