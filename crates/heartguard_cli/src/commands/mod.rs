//! CLI command implementations.

pub mod cache;
pub mod client;
pub mod queue;
pub mod sync;

use client::ReqwestClient;
use heartguard_offline::{
    ConnectivityMonitor, ConnectivitySignal, HttpTransport, OfflineConfig, OfflineFacade,
};
use heartguard_storage::FileStore;
use std::path::Path;
use std::sync::Arc;

/// The facade every command works through.
pub type CliFacade = OfflineFacade<FileStore, HttpTransport<ReqwestClient>>;

/// Opens the data directory at `path`.
///
/// The CLI has no connectivity check of its own: it treats itself as
/// online when an API base URL is configured.
pub fn open(
    path: &Path,
    base_url: Option<&str>,
) -> Result<CliFacade, Box<dyn std::error::Error>> {
    let store = FileStore::open(path)?;
    let config = OfflineConfig::new(base_url.unwrap_or_default()).without_periodic_sync();
    let transport = HttpTransport::new(config.clone(), ReqwestClient::new()?);
    let connectivity: Arc<dyn ConnectivityMonitor> =
        Arc::new(ConnectivitySignal::new(base_url.is_some()));

    Ok(OfflineFacade::new(
        config,
        Arc::new(store),
        Arc::new(transport),
        connectivity,
    ))
}
