//! Configuration for the offline subsystem.

use std::time::Duration;

/// Default interval between periodic sync passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(5);

/// Configuration for offline sync.
#[derive(Debug, Clone)]
pub struct OfflineConfig {
    /// Base URL of the HeartGuard API (e.g., "https://heartguard.example.com").
    /// Queued endpoints such as `/api/log` are appended to it.
    pub base_url: String,
    /// Interval for the periodic sync while the facade is started.
    /// `None` disables the timer.
    pub sync_interval: Option<Duration>,
    /// Whether a `BecameOnline` transition triggers a sync pass.
    pub sync_on_reconnect: bool,
    /// Request timeout handed to the HTTP client.
    pub request_timeout: Duration,
}

impl OfflineConfig {
    /// Creates a new configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            sync_interval: Some(DEFAULT_SYNC_INTERVAL),
            sync_on_reconnect: true,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the periodic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Disables the periodic sync timer.
    pub fn without_periodic_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }

    /// Sets whether reconnecting triggers a sync pass.
    pub fn with_sync_on_reconnect(mut self, enabled: bool) -> Self {
        self.sync_on_reconnect = enabled;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Joins the base URL and a queued endpoint.
    ///
    /// Absolute endpoints (`http://`, `https://`) are used as-is.
    pub fn resolve(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        let base = self.base_url.trim_end_matches('/');
        if endpoint.starts_with('/') {
            format!("{base}{endpoint}")
        } else {
            format!("{base}/{endpoint}")
        }
    }
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self::new("")
    }
}
