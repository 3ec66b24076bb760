//! The offline facade: the single entry point for the application.

use crate::config::OfflineConfig;
use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor};
use crate::engine::{SyncEngine, SyncPassResult, SyncState, SyncStats};
use crate::error::OfflineResult;
use crate::model::{HttpMethod, MutationId, OfflineStatus, PendingMutation, SyncStatus};
use crate::queue::DurableQueue;
use crate::scheduler::{ScheduleOptions, SyncScheduler, SyncTarget, SyncTrigger};
use crate::session::SyncSession;
use crate::transport::{MutationRequest, SyncTransport, TransportResponse};
use async_trait::async_trait;
use heartguard_storage::KvStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// What [`OfflineFacade::submit`] did with a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Sent directly; the server answered with this response.
    Sent(TransportResponse),
    /// Queued for a later sync pass.
    Queued(MutationId),
}

struct FacadeInner<S: KvStore, T: SyncTransport> {
    queue: Arc<DurableQueue<S>>,
    transport: Arc<T>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    session: Arc<SyncSession>,
    engine: SyncEngine<S, T>,
    status: watch::Sender<OfflineStatus>,
}

impl<S: KvStore, T: SyncTransport> FacadeInner<S, T> {
    fn snapshot(&self) -> OfflineStatus {
        let pending = match self.queue.len() {
            Ok(n) => n as u64,
            Err(e) => {
                warn!(error = %e, "cannot read queue length, reporting last known status");
                self.status.borrow().sync_status.pending
            }
        };
        OfflineStatus {
            is_online: self.connectivity.is_online(),
            sync_status: self.session.status(pending),
        }
    }

    fn publish(&self) -> OfflineStatus {
        let status = self.snapshot();
        self.status.send_replace(status);
        status
    }

    async fn sync(&self) -> SyncPassResult {
        let result = self.engine.sync_all().await;
        self.publish();
        result
    }
}

#[async_trait]
impl<S, T> SyncTarget for FacadeInner<S, T>
where
    S: KvStore + 'static,
    T: SyncTransport + 'static,
{
    async fn run_sync(&self, trigger: SyncTrigger) {
        debug!(?trigger, "scheduled sync");
        self.sync().await;
    }

    fn connectivity_changed(&self, _event: ConnectivityEvent) {
        self.publish();
    }
}

/// Single integration surface for offline data.
///
/// Creating a facade starts a fresh [`SyncSession`]. Mutations already in
/// the store from an earlier session count towards this session's total.
/// [`start`](Self::start) mounts the background scheduler (periodic timer
/// and reconnect trigger); [`shutdown`](Self::shutdown) or dropping the
/// facade tears it down.
///
/// # Example
///
/// ```rust
/// use heartguard_offline::{
///     ConnectivitySignal, HttpMethod, MockTransport, OfflineConfig, OfflineFacade,
/// };
/// use heartguard_storage::InMemoryStore;
/// use std::sync::Arc;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let signal = Arc::new(ConnectivitySignal::new(false));
/// let facade = OfflineFacade::new(
///     OfflineConfig::default(),
///     Arc::new(InMemoryStore::new()),
///     Arc::new(MockTransport::new()),
///     signal.clone(),
/// );
///
/// facade
///     .store_offline_data("/api/log", HttpMethod::Post, serde_json::json!({"bp": 120}))
///     .unwrap();
/// assert_eq!(facade.get_sync_status().pending, 1);
///
/// signal.set_online(true);
/// facade.sync_offline_data().await;
/// assert_eq!(facade.get_sync_status().synced, 1);
/// # }
/// ```
pub struct OfflineFacade<S, T>
where
    S: KvStore + 'static,
    T: SyncTransport + 'static,
{
    config: OfflineConfig,
    inner: Arc<FacadeInner<S, T>>,
    scheduler: Mutex<Option<SyncScheduler>>,
}

impl<S, T> OfflineFacade<S, T>
where
    S: KvStore + 'static,
    T: SyncTransport + 'static,
{
    /// Creates a facade over `store`, sending through `transport`.
    pub fn new(
        config: OfflineConfig,
        store: Arc<S>,
        transport: Arc<T>,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        let queue = Arc::new(DurableQueue::new(store));
        let session = Arc::new(SyncSession::new());
        let engine = SyncEngine::new(
            Arc::clone(&queue),
            Arc::clone(&transport),
            Arc::clone(&connectivity),
            Arc::clone(&session),
        );
        let (status, _) = watch::channel(OfflineStatus::default());

        let inner = Arc::new(FacadeInner {
            queue,
            transport,
            connectivity,
            session,
            engine,
            status,
        });
        let initial = inner.publish();
        debug!(pending = initial.sync_status.pending, "offline facade created");

        Self {
            config,
            inner,
            scheduler: Mutex::new(None),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &OfflineConfig {
        &self.config
    }

    /// Starts the background scheduler. Does nothing if already started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut scheduler = self.scheduler.lock();
        if scheduler.is_some() {
            return;
        }

        let target: Arc<dyn SyncTarget> = Arc::clone(&self.inner) as Arc<dyn SyncTarget>;
        *scheduler = Some(SyncScheduler::start(
            target,
            self.inner.connectivity.as_ref(),
            ScheduleOptions {
                interval: self.config.sync_interval,
                sync_on_reconnect: self.config.sync_on_reconnect,
            },
        ));
        info!("offline facade started");
    }

    /// Returns true while the scheduler is running.
    pub fn is_started(&self) -> bool {
        self.scheduler
            .lock()
            .as_ref()
            .is_some_and(SyncScheduler::is_running)
    }

    /// Stops the background scheduler and waits for it to exit.
    pub async fn shutdown(&self) {
        let scheduler = self.scheduler.lock().take();
        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await;
        }
    }

    /// Queues a mutation for the next sync pass.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the mutation could not be stored
    /// durably. The caller should tell the user the action was not saved.
    pub fn store_offline_data(
        &self,
        endpoint: &str,
        method: HttpMethod,
        payload: serde_json::Value,
    ) -> OfflineResult<MutationId> {
        let id = self.inner.queue.enqueue(endpoint, method, payload)?;
        self.inner.publish();
        Ok(id)
    }

    /// Sends a mutation now if possible, otherwise queues it.
    ///
    /// The mutation is queued instead of sent when the device is offline,
    /// when earlier mutations are still queued (so it cannot overtake
    /// them), or when the send fails with `NetworkUnavailable`.
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the mutation had to be queued and
    /// could not be stored, and any other transport error as is.
    pub async fn submit(
        &self,
        endpoint: &str,
        method: HttpMethod,
        payload: serde_json::Value,
    ) -> OfflineResult<SubmitOutcome> {
        if !self.is_online() || !self.inner.queue.is_empty()? {
            return self
                .store_offline_data(endpoint, method, payload)
                .map(SubmitOutcome::Queued);
        }

        let request = MutationRequest::new(method, endpoint, payload);
        match self.inner.transport.send(&request).await {
            Ok(response) => Ok(SubmitOutcome::Sent(response)),
            Err(e) if e.is_network_unavailable() => {
                debug!(endpoint, error = %e, "network unavailable, queueing");
                self.store_offline_data(endpoint, method, request.payload)
                    .map(SubmitOutcome::Queued)
            }
            Err(e) => Err(e),
        }
    }

    /// Runs a sync pass, or joins the one in flight.
    pub async fn sync_offline_data(&self) -> SyncPassResult {
        self.inner.sync().await
    }

    /// Fetches `url` and stores the body in the asset cache.
    ///
    /// # Errors
    ///
    /// Returns the network error if the fetch failed or answered non-2xx,
    /// and `StorageUnavailable` if the body could not be stored.
    pub async fn cache_asset(&self, url: &str) -> OfflineResult<String> {
        let response = self.inner.transport.fetch(url).await?.into_result()?;
        self.inner.queue.cache_asset(url, &response.body)?;
        Ok(response.body)
    }

    /// Stores `content` for `url` without fetching it.
    pub fn cache_asset_content(&self, url: &str, content: &str) -> OfflineResult<()> {
        self.inner.queue.cache_asset(url, content)
    }

    /// Returns the cached body for `url`.
    pub fn get_cached_asset(&self, url: &str) -> OfflineResult<Option<String>> {
        self.inner.queue.get_cached_asset(url)
    }

    /// Drops every pending mutation and cached asset, and resets the
    /// session. Used on logout.
    pub fn clear_offline_data(&self) -> OfflineResult<()> {
        self.inner.queue.clear()?;
        self.inner.session.reset();
        self.inner.publish();
        info!("offline data cleared");
        Ok(())
    }

    /// Returns the pending mutations in replay order.
    pub fn pending_mutations(&self) -> OfflineResult<Vec<PendingMutation>> {
        self.inner.queue.list_pending()
    }

    /// Returns the bytes held by the backing store.
    pub fn storage_used(&self) -> OfflineResult<usize> {
        self.inner.queue.storage_used()
    }

    /// Returns the current session's progress.
    pub fn get_sync_status(&self) -> SyncStatus {
        self.inner.snapshot().sync_status
    }

    /// Returns the current connectivity.
    pub fn is_online(&self) -> bool {
        self.inner.connectivity.is_online()
    }

    /// Returns connectivity and progress together.
    pub fn status(&self) -> OfflineStatus {
        self.inner.snapshot()
    }

    /// Subscribes to status updates. A new value is published after every
    /// enqueue, sync pass, clear and observed connectivity transition.
    pub fn watch_status(&self) -> watch::Receiver<OfflineStatus> {
        self.inner.status.subscribe()
    }

    /// Returns the sync engine's state.
    pub fn sync_state(&self) -> SyncState {
        self.inner.engine.state()
    }

    /// Returns the sync engine's statistics.
    pub fn sync_stats(&self) -> SyncStats {
        self.inner.engine.stats()
    }
}
