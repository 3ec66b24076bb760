//! # HeartGuard Offline
//!
//! Offline-first data layer for HeartGuard.
//!
//! This crate provides:
//! - A durable FIFO queue of pending mutations and an asset cache
//! - A connectivity monitor with transition events
//! - A sync engine that replays the queue against the remote API
//! - A background scheduler (periodic timer and reconnect trigger)
//! - HTTP transport abstraction
//! - The [`OfflineFacade`], the only type the application needs
//!
//! ## Architecture
//!
//! User actions that change server data are recorded as
//! [`PendingMutation`]s. While offline they accumulate in the
//! [`DurableQueue`]. A sync pass sends them oldest first, one at a time;
//! a mutation leaves the queue only after the server answered 2xx.
//!
//! ```text
//! OfflineFacade ──► DurableQueue ──► KvStore (heartguard_storage)
//!       │                 ▲
//!       ▼                 │
//! SyncScheduler ──► SyncEngine ──► SyncTransport (HttpTransport / MockTransport)
//!       ▲
//! ConnectivityMonitor
//! ```
//!
//! ## Key Invariants
//!
//! - Replay order is enqueue order
//! - Delivery is at-least-once; nothing is dropped without a 2xx
//! - At most one sync pass runs at a time; concurrent callers join it
//! - A failed item stays queued and does not block later items
//! - `total == synced + pending` in every status snapshot

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod engine;
mod error;
mod facade;
mod http;
mod model;
mod queue;
mod scheduler;
mod session;
mod transport;

pub use config::{OfflineConfig, DEFAULT_SYNC_INTERVAL};
pub use connectivity::{ConnectivityEvent, ConnectivityMonitor, ConnectivitySignal, Subscription};
pub use engine::{SyncEngine, SyncItemFailed, SyncPassResult, SyncState, SyncStats};
pub use error::{OfflineError, OfflineResult};
pub use facade::{OfflineFacade, SubmitOutcome};
pub use http::{HttpClient, HttpClientError, HttpRequest, HttpTransport, LoopbackClient, LoopbackServer};
pub use model::{
    now_millis, CachedAsset, HttpMethod, MutationId, OfflineStatus, PendingMutation, SyncStatus,
};
pub use queue::{DurableQueue, CACHED_ASSETS_KEY, PENDING_MUTATIONS_KEY};
pub use scheduler::{ScheduleOptions, SyncScheduler, SyncTarget, SyncTrigger};
pub use session::SyncSession;
pub use transport::{MockReply, MockTransport, MutationRequest, SyncTransport, TransportResponse};
