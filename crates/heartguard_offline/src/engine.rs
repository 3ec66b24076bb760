//! Sync engine: drains the durable queue against the remote API.

use crate::connectivity::ConnectivityMonitor;
use crate::error::OfflineResult;
use crate::model::{MutationId, PendingMutation};
use crate::queue::DurableQueue;
use crate::session::SyncSession;
use crate::transport::{MutationRequest, SyncTransport};
use heartguard_storage::KvStore;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// The current state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No pass has run yet.
    Idle,
    /// A pass is draining the queue.
    Syncing,
    /// The last pass applied everything it attempted.
    Synced,
    /// The last pass had failed items or was aborted.
    Error,
}

impl SyncState {
    /// Returns true if a pass is running.
    pub fn is_active(&self) -> bool {
        matches!(self, SyncState::Syncing)
    }
}

/// Statistics about sync passes since the engine was created.
#[derive(Debug, Clone, Default)]
pub struct SyncStats {
    /// Passes that ran to the end of the queue or were aborted.
    pub passes_completed: u64,
    /// Passes that stopped early.
    pub passes_aborted: u64,
    /// `sync_all` calls that joined a pass already in flight.
    pub joined_calls: u64,
    /// Mutations applied remotely.
    pub mutations_synced: u64,
    /// Failed mutation attempts.
    pub failed_attempts: u64,
    /// End time of the last pass.
    pub last_sync_time: Option<Instant>,
    /// Last error message.
    pub last_error: Option<String>,
}

/// A mutation whose network call failed during a pass. It stays queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncItemFailed {
    /// The mutation.
    pub id: MutationId,
    /// Its endpoint.
    pub endpoint: String,
    /// Attempt counter after this failure.
    pub sync_attempts: u32,
    /// What went wrong.
    pub reason: String,
    /// Whether a later pass may succeed (network errors, 5xx, 429).
    pub retryable: bool,
}

/// Result of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncPassResult {
    /// Mutations whose network call was issued.
    pub attempted: u64,
    /// Mutations applied and removed from the queue.
    pub synced: u64,
    /// Mutations that failed and stay queued.
    pub failed: Vec<SyncItemFailed>,
    /// Why the pass stopped before the end of the queue, if it did.
    pub abort_reason: Option<String>,
    /// Queue length when the pass finished.
    pub remaining: u64,
    /// Duration of the pass.
    pub duration: Duration,
}

impl SyncPassResult {
    /// Returns true if the pass stopped before the end of the queue.
    pub fn is_aborted(&self) -> bool {
        self.abort_reason.is_some()
    }

    /// Returns true if every attempted mutation was applied and the pass
    /// was not aborted.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && !self.is_aborted()
    }

    fn aborted(reason: impl Into<String>) -> Self {
        Self {
            abort_reason: Some(reason.into()),
            ..Self::default()
        }
    }
}

type PassReceiver = watch::Receiver<Option<SyncPassResult>>;

/// Clears the in-flight slot even if the pass future is dropped.
struct InFlightSlot<'a> {
    slot: &'a Mutex<Option<PassReceiver>>,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        *self.slot.lock() = None;
    }
}

/// The sync engine replays queued mutations in FIFO order.
///
/// At most one pass runs at a time: a `sync_all` call made while a pass is
/// in flight waits for that pass and returns its result. Within a pass,
/// mutations are sent one after another, never in parallel.
///
/// Delivery is at-least-once. A mutation leaves the queue only after its
/// request succeeded; if the process dies between the server applying it
/// and the local dequeue, it is sent again on the next pass. No
/// idempotency key is sent, so the server may apply it twice.
pub struct SyncEngine<S: KvStore, T: SyncTransport> {
    queue: Arc<DurableQueue<S>>,
    transport: Arc<T>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    session: Arc<SyncSession>,
    state: RwLock<SyncState>,
    stats: RwLock<SyncStats>,
    in_flight: Mutex<Option<PassReceiver>>,
}

impl<S: KvStore, T: SyncTransport> SyncEngine<S, T> {
    /// Creates a new sync engine.
    pub fn new(
        queue: Arc<DurableQueue<S>>,
        transport: Arc<T>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        session: Arc<SyncSession>,
    ) -> Self {
        Self {
            queue,
            transport,
            connectivity,
            session,
            state: RwLock::new(SyncState::Idle),
            stats: RwLock::new(SyncStats::default()),
            in_flight: Mutex::new(None),
        }
    }

    /// Gets the current state.
    pub fn state(&self) -> SyncState {
        *self.state.read()
    }

    /// Gets the current stats.
    pub fn stats(&self) -> SyncStats {
        self.stats.read().clone()
    }

    /// Returns true if a pass is in flight.
    pub fn is_syncing(&self) -> bool {
        self.in_flight.lock().is_some()
    }

    /// Runs one sync pass, or joins the one already in flight.
    pub async fn sync_all(&self) -> SyncPassResult {
        let claimed = {
            let mut slot = self.in_flight.lock();
            match slot.as_ref() {
                Some(receiver) => Err(receiver.clone()),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    *slot = Some(receiver);
                    Ok(sender)
                }
            }
        };

        let sender = match claimed {
            Ok(sender) => sender,
            Err(receiver) => return self.join(receiver).await,
        };

        let result = {
            let _slot = InFlightSlot {
                slot: &self.in_flight,
            };
            self.run_pass().await
        };

        sender.send_replace(Some(result.clone()));
        result
    }

    async fn join(&self, mut receiver: PassReceiver) -> SyncPassResult {
        self.stats.write().joined_calls += 1;
        debug!("sync pass already in flight, joining it");

        match receiver.wait_for(Option::is_some).await {
            Ok(result) => result.clone().unwrap_or_default(),
            Err(_) => SyncPassResult::aborted("in-flight sync pass was interrupted"),
        }
    }

    async fn run_pass(&self) -> SyncPassResult {
        let start = Instant::now();
        *self.state.write() = SyncState::Syncing;

        let mut result = if self.connectivity.is_online() {
            self.drain().await
        } else {
            debug!("offline, skipping sync pass");
            SyncPassResult::aborted("offline")
        };

        result.remaining = self.queue.len().map_or(result.remaining, |n| n as u64);
        result.duration = start.elapsed();
        self.finish(&result);
        result
    }

    async fn drain(&self) -> SyncPassResult {
        let pending = match self.queue.list_pending() {
            Ok(pending) => pending,
            Err(e) => {
                warn!(error = %e, "cannot read pending mutations");
                return SyncPassResult::aborted(e.to_string());
            }
        };

        let mut result = SyncPassResult {
            remaining: pending.len() as u64,
            ..SyncPassResult::default()
        };
        if pending.is_empty() {
            return result;
        }
        info!(pending = pending.len(), "sync pass started");
        let epoch = self.session.epoch();

        for mutation in &pending {
            if self.session.epoch() != epoch {
                info!("offline data cleared, stopping sync pass");
                result.abort_reason = Some("offline data cleared".to_string());
                break;
            }
            match self.queue.get(mutation.id) {
                Ok(Some(_)) => {}
                Ok(None) => {
                    debug!(id = %mutation.id, "mutation no longer queued, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(error = %e, "cannot read pending mutations");
                    result.abort_reason = Some(e.to_string());
                    break;
                }
            }
            result.attempted += 1;

            let error = match self.apply(mutation).await {
                Ok(()) => match self.queue.dequeue(mutation.id) {
                    Ok(true) => {
                        self.session.record_synced();
                        result.synced += 1;
                        continue;
                    }
                    Ok(false) => {
                        // Removed while its request was in flight.
                        debug!(id = %mutation.id, "applied mutation was already removed");
                        continue;
                    }
                    Err(e) => {
                        // Applied remotely but still queued: it will be resent.
                        warn!(id = %mutation.id, error = %e, "applied mutation could not be dequeued");
                        result.abort_reason = Some(e.to_string());
                        break;
                    }
                },
                Err(e) => e,
            };

            let sync_attempts = self.record_failure(mutation);
            let retryable = error.is_retryable();
            warn!(
                id = %mutation.id,
                endpoint = %mutation.endpoint,
                attempts = sync_attempts,
                retryable,
                error = %error,
                "mutation sync failed"
            );
            result.failed.push(SyncItemFailed {
                id: mutation.id,
                endpoint: mutation.endpoint.clone(),
                sync_attempts,
                reason: error.to_string(),
                retryable,
            });

            if error.is_network_unavailable() {
                result.abort_reason = Some(error.to_string());
                break;
            }
        }

        result
    }

    async fn apply(&self, mutation: &PendingMutation) -> OfflineResult<()> {
        let request = MutationRequest::from(mutation);
        self.transport.send(&request).await?.into_result()?;
        Ok(())
    }

    fn record_failure(&self, mutation: &PendingMutation) -> u32 {
        match self.queue.record_failure(mutation.id) {
            Ok(Some(attempts)) => attempts,
            Ok(None) => mutation.sync_attempts.saturating_add(1),
            Err(e) => {
                warn!(id = %mutation.id, error = %e, "cannot record failed attempt");
                mutation.sync_attempts.saturating_add(1)
            }
        }
    }

    fn finish(&self, result: &SyncPassResult) {
        let state = if result.is_clean() {
            SyncState::Synced
        } else {
            SyncState::Error
        };
        *self.state.write() = state;

        {
            let mut stats = self.stats.write();
            stats.passes_completed += 1;
            stats.mutations_synced += result.synced;
            stats.failed_attempts += result.failed.len() as u64;
            stats.last_sync_time = Some(Instant::now());
            if let Some(reason) = &result.abort_reason {
                stats.passes_aborted += 1;
                stats.last_error = Some(reason.clone());
            } else if let Some(failure) = result.failed.last() {
                stats.last_error = Some(failure.reason.clone());
            } else {
                stats.last_error = None;
            }
        }

        if result.attempted > 0 || result.is_aborted() {
            info!(
                attempted = result.attempted,
                synced = result.synced,
                failed = result.failed.len(),
                remaining = result.remaining,
                aborted = result.is_aborted(),
                "sync pass finished"
            );
        }
    }
}
