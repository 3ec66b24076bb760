//! Per-session sync counters.

use crate::model::SyncStatus;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for the current session.
///
/// A session starts when the facade is created and ends when it is
/// dropped or its data is cleared. The engine and the facade share one
/// session by reference; nothing else writes it.
///
/// `total` in a [`SyncStatus`] is `synced + pending`: every mutation
/// queued this session (or recovered from storage when it started) is
/// either applied or still queued.
///
/// Every [`reset`](Self::reset) starts a new epoch. A sync pass remembers
/// the epoch it started in and stops once it changes, so mutations that
/// were cleared mid-pass are neither sent nor counted.
#[derive(Debug, Default)]
pub struct SyncSession {
    synced: AtomicU64,
    epoch: AtomicU64,
}

impl SyncSession {
    /// Creates a session with zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one mutation applied remotely.
    pub fn record_synced(&self) {
        self.synced.fetch_add(1, Ordering::SeqCst);
    }

    /// Mutations applied this session.
    pub fn synced(&self) -> u64 {
        self.synced.load(Ordering::SeqCst)
    }

    /// Current epoch. Changes on every reset.
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::SeqCst)
    }

    /// Zeroes the counters and starts a new epoch.
    pub fn reset(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.synced.store(0, Ordering::SeqCst);
    }

    /// Builds a status snapshot given the current queue length.
    pub fn status(&self, pending: u64) -> SyncStatus {
        let synced = self.synced();
        SyncStatus {
            total: synced + pending,
            synced,
            pending,
        }
    }
}
