//! Background task that triggers sync passes.
//!
//! The scheduler owns one tokio task. The task wakes on a fixed interval
//! and on connectivity transitions, and hands each wake-up to a
//! [`SyncTarget`]. Transitions keep flowing to the target while a pass
//! runs. It stops when the scheduler is shut down or dropped; a pass that
//! is already running is left to finish.

use crate::connectivity::{ConnectivityEvent, ConnectivityMonitor, Subscription};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Interval, MissedTickBehavior};
use tracing::{debug, info};

/// Why the scheduler asked for a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// The periodic timer fired.
    Periodic,
    /// Connectivity came back.
    Reconnect,
}

/// Receiver of scheduler wake-ups.
#[async_trait]
pub trait SyncTarget: Send + Sync + 'static {
    /// Runs a sync pass.
    async fn run_sync(&self, trigger: SyncTrigger);

    /// Observes a connectivity transition, including while a pass runs.
    /// Called before any reconnect sync.
    fn connectivity_changed(&self, event: ConnectivityEvent);
}

/// Settings for a scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Period of the timer, or `None` for no timer.
    pub interval: Option<Duration>,
    /// Whether `BecameOnline` triggers a sync.
    pub sync_on_reconnect: bool,
}

/// Handle to a running scheduler task.
pub struct SyncScheduler {
    shutdown: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl SyncScheduler {
    /// Spawns the scheduler task on the current tokio runtime.
    pub fn start(
        target: Arc<dyn SyncTarget>,
        connectivity: &dyn ConnectivityMonitor,
        options: ScheduleOptions,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let subscription = connectivity.subscribe();
        let ticker = options.interval.map(|period| {
            let mut ticker = time::interval_at(time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });

        info!(interval = ?options.interval, reconnect = options.sync_on_reconnect, "sync scheduler started");
        let handle = tokio::spawn(run(
            target,
            subscription,
            ticker,
            options.sync_on_reconnect,
            shutdown_rx,
        ));

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Returns true while the task is running.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the task and waits for it to exit, including any pass it
    /// started.
    pub async fn shutdown(mut self) {
        self.shutdown.send_replace(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
        info!("sync scheduler stopped");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

async fn run(
    target: Arc<dyn SyncTarget>,
    mut subscription: Subscription,
    mut ticker: Option<Interval>,
    sync_on_reconnect: bool,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut listening = true;

    loop {
        let trigger = tokio::select! {
            biased;

            _ = shutdown.changed() => break,

            event = subscription.next(), if listening => match event {
                Some(event) => {
                    target.connectivity_changed(event);
                    if event != ConnectivityEvent::BecameOnline || !sync_on_reconnect {
                        continue;
                    }
                    debug!("reconnected, triggering sync");
                    SyncTrigger::Reconnect
                }
                None => {
                    listening = false;
                    continue;
                }
            },

            _ = next_tick(&mut ticker) => SyncTrigger::Periodic,
        };

        let mut next = Some(trigger);
        while let Some(trigger) = next.take() {
            let reconnected = run_pass(&target, trigger, &mut subscription, &mut listening).await;
            if reconnected && sync_on_reconnect && !*shutdown.borrow() {
                debug!("reconnected during sync, triggering another");
                next = Some(SyncTrigger::Reconnect);
            }
        }

        if *shutdown.borrow() {
            break;
        }
    }
}

/// Runs one pass, forwarding transitions to the target until it finishes.
///
/// Returns true if the last transition seen during the pass was
/// `BecameOnline`.
async fn run_pass(
    target: &Arc<dyn SyncTarget>,
    trigger: SyncTrigger,
    subscription: &mut Subscription,
    listening: &mut bool,
) -> bool {
    let pass = target.run_sync(trigger);
    tokio::pin!(pass);
    let mut reconnected = false;

    loop {
        tokio::select! {
            biased;

            _ = &mut pass => return reconnected,

            event = subscription.next(), if *listening => match event {
                Some(event) => {
                    target.connectivity_changed(event);
                    reconnected = event == ConnectivityEvent::BecameOnline;
                }
                None => *listening = false,
            },
        }
    }
}
