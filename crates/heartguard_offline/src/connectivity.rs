//! Connectivity monitoring.
//!
//! The sync engine and scheduler only see the [`ConnectivityMonitor`]
//! trait. Platform glue feeds reachability changes into a
//! [`ConnectivitySignal`]; tests drive the same type directly.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;
use tracing::info;

/// Capacity of the transition channel. A subscriber that falls further
/// behind than this skips the oldest transitions.
const EVENT_CAPACITY: usize = 64;

/// A connectivity transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEvent {
    /// The device went from offline to online.
    BecameOnline,
    /// The device went from online to offline.
    BecameOffline,
}

/// Source of online/offline state and transitions.
pub trait ConnectivityMonitor: Send + Sync {
    /// Returns the current connectivity state.
    fn is_online(&self) -> bool;

    /// Subscribes to transitions that happen after this call.
    fn subscribe(&self) -> Subscription;
}

/// A live subscription to connectivity transitions.
///
/// Dropping the subscription, or calling [`Subscription::unsubscribe`],
/// ends it.
#[derive(Debug)]
pub struct Subscription {
    receiver: broadcast::Receiver<ConnectivityEvent>,
}

impl Subscription {
    /// Wraps a broadcast receiver.
    pub fn new(receiver: broadcast::Receiver<ConnectivityEvent>) -> Self {
        Self { receiver }
    }

    /// Waits for the next transition.
    ///
    /// Returns `None` once the monitor is gone. If this subscriber lagged
    /// behind, missed transitions are skipped and the next available one
    /// is returned.
    pub async fn next(&mut self) -> Option<ConnectivityEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next transition if one is already waiting.
    pub fn try_next(&mut self) -> Option<ConnectivityEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }

    /// Ends the subscription.
    pub fn unsubscribe(self) {}
}

/// Connectivity state driven by reachability notifications.
///
/// Repeated notifications of the state the signal is already in are
/// ignored, so each real transition is published exactly once.
#[derive(Debug)]
pub struct ConnectivitySignal {
    online: AtomicBool,
    sender: broadcast::Sender<ConnectivityEvent>,
    update: Mutex<()>,
}

impl ConnectivitySignal {
    /// Creates a signal starting in the given state.
    pub fn new(online: bool) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            online: AtomicBool::new(online),
            sender,
            update: Mutex::new(()),
        }
    }

    /// Records a reachability notification.
    ///
    /// Returns the transition it caused, or `None` if the state did not
    /// change.
    pub fn set_online(&self, online: bool) -> Option<ConnectivityEvent> {
        let _guard = self.update.lock();
        if self.online.swap(online, Ordering::SeqCst) == online {
            return None;
        }

        let event = if online {
            info!("network online");
            ConnectivityEvent::BecameOnline
        } else {
            info!("network offline");
            ConnectivityEvent::BecameOffline
        };
        // No subscribers is fine.
        let _ = self.sender.send(event);
        Some(event)
    }

    /// Returns the number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for ConnectivitySignal {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ConnectivityMonitor for ConnectivitySignal {
    fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn subscribe(&self) -> Subscription {
        Subscription::new(self.sender.subscribe())
    }
}
