//! Integration tests for the offline facade against a fake HeartGuard API.

use heartguard_offline::{
    ConnectivityMonitor, ConnectivitySignal, HttpMethod, HttpTransport, LoopbackClient,
    LoopbackServer, OfflineConfig, OfflineFacade, SyncState, SyncStatus,
};
use heartguard_storage::{FileStore, InMemoryStore, KvStore};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// A request as the fake API saw it.
#[derive(Debug, Clone, PartialEq)]
struct Received {
    method: String,
    path: String,
    body: Option<Value>,
}

#[derive(Default)]
struct ApiState {
    received: Mutex<Vec<Received>>,
    failing: Mutex<HashSet<String>>,
}

/// In-process stand-in for the HeartGuard REST API.
#[derive(Clone, Default)]
struct FakeApi(Arc<ApiState>);

impl FakeApi {
    fn fail(&self, path: &str) {
        self.0.failing.lock().insert(path.to_string());
    }

    fn recover(&self, path: &str) {
        self.0.failing.lock().remove(path);
    }

    fn received(&self) -> Vec<Received> {
        self.0.received.lock().clone()
    }
}

impl LoopbackServer for FakeApi {
    fn handle(&self, method: &str, path: &str, body: Option<&[u8]>) -> (u16, String) {
        let body = body.map(|b| serde_json::from_slice(b).unwrap_or(Value::Null));
        self.0.received.lock().push(Received {
            method: method.to_string(),
            path: path.to_string(),
            body,
        });

        if self.0.failing.lock().contains(path) {
            return (500, r#"{"error":"internal"}"#.to_string());
        }
        match method {
            "GET" => (200, format!(r#"{{"path":"{path}"}}"#)),
            "POST" => (201, r#"{"ok":true}"#.to_string()),
            _ => (200, r#"{"ok":true}"#.to_string()),
        }
    }
}

type ApiTransport = HttpTransport<LoopbackClient<FakeApi>>;

fn config() -> OfflineConfig {
    OfflineConfig::new("https://heartguard.test").without_periodic_sync()
}

fn facade_over<S: KvStore + 'static>(
    store: Arc<S>,
    api: &FakeApi,
    signal: &Arc<ConnectivitySignal>,
) -> OfflineFacade<S, ApiTransport> {
    let transport = HttpTransport::new(config(), LoopbackClient::new(api.clone()));
    OfflineFacade::new(
        config(),
        store,
        Arc::new(transport),
        Arc::clone(signal) as Arc<dyn ConnectivityMonitor>,
    )
}

fn status(total: u64, synced: u64, pending: u64) -> SyncStatus {
    SyncStatus {
        total,
        synced,
        pending,
    }
}

#[tokio::test]
async fn reconnect_drains_queue_in_order() {
    let api = FakeApi::default();
    let signal = Arc::new(ConnectivitySignal::new(false));
    let facade = facade_over(Arc::new(InMemoryStore::new()), &api, &signal);
    facade.start();

    facade
        .store_offline_data("/api/log", HttpMethod::Post, json!({"a": 1}))
        .unwrap();
    facade
        .store_offline_data("/api/log/1", HttpMethod::Put, json!({"a": 2}))
        .unwrap();
    assert_eq!(facade.get_sync_status(), status(2, 0, 2));
    assert!(api.received().is_empty());

    let mut updates = facade.watch_status();
    signal.set_online(true);

    let settled = tokio::time::timeout(
        Duration::from_secs(5),
        updates.wait_for(|s| s.is_online && s.sync_status.pending == 0),
    )
    .await
    .expect("reconnect sync did not finish")
    .map(|s| *s)
    .unwrap();

    assert_eq!(settled.sync_status, status(2, 2, 0));
    assert_eq!(
        api.received(),
        vec![
            Received {
                method: "POST".into(),
                path: "/api/log".into(),
                body: Some(json!({"a": 1})),
            },
            Received {
                method: "PUT".into(),
                path: "/api/log/1".into(),
                body: Some(json!({"a": 2})),
            },
        ]
    );

    facade.shutdown().await;
}

#[tokio::test]
async fn failed_item_stays_queued_and_retries() {
    let api = FakeApi::default();
    let signal = Arc::new(ConnectivitySignal::new(true));
    let facade = facade_over(Arc::new(InMemoryStore::new()), &api, &signal);

    facade
        .store_offline_data("/api/log", HttpMethod::Post, json!({"a": 1}))
        .unwrap();
    let m2 = facade
        .store_offline_data("/api/log/1", HttpMethod::Put, json!({"a": 2}))
        .unwrap();
    api.fail("/api/log/1");

    let result = facade.sync_offline_data().await;
    assert_eq!(result.synced, 1);
    assert_eq!(result.failed.len(), 1);
    assert!(!result.is_aborted());

    let pending = facade.pending_mutations().unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].id, m2);
    assert_eq!(pending[0].sync_attempts, 1);
    assert_eq!(facade.get_sync_status(), status(2, 1, 1));
    assert_eq!(facade.sync_state(), SyncState::Error);

    api.recover("/api/log/1");
    facade.sync_offline_data().await;
    assert_eq!(facade.get_sync_status(), status(2, 2, 0));
    assert_eq!(facade.sync_state(), SyncState::Synced);
}

#[tokio::test]
async fn failed_head_does_not_block_later_items() {
    let api = FakeApi::default();
    let signal = Arc::new(ConnectivitySignal::new(true));
    let facade = facade_over(Arc::new(InMemoryStore::new()), &api, &signal);
    api.fail("/api/log");

    facade
        .store_offline_data("/api/log", HttpMethod::Post, json!({"a": 1}))
        .unwrap();
    facade
        .store_offline_data("/api/profile", HttpMethod::Put, json!({"name": "x"}))
        .unwrap();

    let result = facade.sync_offline_data().await;
    assert_eq!(result.synced, 1);
    assert_eq!(facade.pending_mutations().unwrap()[0].endpoint, "/api/log");
}

#[tokio::test]
async fn clear_discards_everything() {
    let api = FakeApi::default();
    let signal = Arc::new(ConnectivitySignal::new(false));
    let facade = facade_over(Arc::new(InMemoryStore::new()), &api, &signal);

    for i in 0..3 {
        facade
            .store_offline_data("/api/log", HttpMethod::Post, json!({ "i": i }))
            .unwrap();
    }
    facade.clear_offline_data().unwrap();

    assert_eq!(facade.get_sync_status(), status(0, 0, 0));

    signal.set_online(true);
    let result = facade.sync_offline_data().await;
    assert_eq!(result.attempted, 0);
    assert!(api.received().is_empty());
}

#[tokio::test]
async fn empty_payload_is_sent_as_empty_object() {
    let api = FakeApi::default();
    let signal = Arc::new(ConnectivitySignal::new(true));
    let facade = facade_over(Arc::new(InMemoryStore::new()), &api, &signal);

    facade
        .store_offline_data("/api/log/7", HttpMethod::Delete, json!({}))
        .unwrap();
    facade.sync_offline_data().await;

    let received = api.received();
    assert_eq!(received[0].method, "DELETE");
    assert_eq!(received[0].body, Some(json!({})));
}

#[tokio::test]
async fn concurrent_syncs_send_each_mutation_once() {
    let api = FakeApi::default();
    let signal = Arc::new(ConnectivitySignal::new(true));
    let facade = facade_over(Arc::new(InMemoryStore::new()), &api, &signal);

    facade
        .store_offline_data("/api/log", HttpMethod::Post, json!({"a": 1}))
        .unwrap();
    facade
        .store_offline_data("/api/log", HttpMethod::Post, json!({"a": 2}))
        .unwrap();

    let (first, second) = tokio::join!(facade.sync_offline_data(), facade.sync_offline_data());
    assert_eq!(first.synced + second.synced, 2);
    assert_eq!(api.received().len(), 2);
    assert_eq!(facade.get_sync_status(), status(2, 2, 0));
}

#[tokio::test]
async fn assets_are_cached_for_offline_reads() {
    let api = FakeApi::default();
    let signal = Arc::new(ConnectivitySignal::new(true));
    let facade = facade_over(Arc::new(InMemoryStore::new()), &api, &signal);

    let body = facade.cache_asset("/api/meal-plans").await.unwrap();
    assert_eq!(body, r#"{"path":"/api/meal-plans"}"#);

    signal.set_online(false);
    assert_eq!(
        facade.get_cached_asset("/api/meal-plans").unwrap().as_deref(),
        Some(r#"{"path":"/api/meal-plans"}"#)
    );
    assert_eq!(facade.get_cached_asset("/api/other").unwrap(), None);
}

#[tokio::test]
async fn queue_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let api = FakeApi::default();

    {
        let signal = Arc::new(ConnectivitySignal::new(false));
        let store = Arc::new(FileStore::open(dir.path()).unwrap());
        let facade = facade_over(store, &api, &signal);
        facade
            .store_offline_data("/api/log", HttpMethod::Post, json!({"a": 1}))
            .unwrap();
        facade
            .store_offline_data("/api/log/1", HttpMethod::Put, json!({"a": 2}))
            .unwrap();
        facade.cache_asset_content("/api/profile", r#"{"name":"x"}"#).unwrap();
    }

    let signal = Arc::new(ConnectivitySignal::new(true));
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let facade = facade_over(store, &api, &signal);
    assert_eq!(facade.get_sync_status(), status(2, 0, 2));
    assert_eq!(
        facade.get_cached_asset("/api/profile").unwrap().as_deref(),
        Some(r#"{"name":"x"}"#)
    );

    facade.sync_offline_data().await;
    let paths: Vec<_> = api.received().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/api/log", "/api/log/1"]);
    assert_eq!(facade.get_sync_status(), status(2, 2, 0));
}
