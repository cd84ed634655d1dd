//! End-to-end delivery tests
//!
//! Runs the relay against a local axum collector with a file store:
//! - Debounced delivery of single events and bursts
//! - Batch cap truncation on success
//! - Persistence and retry while the collector is failing
//! - Reloading pending events after a restart

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use analytics_relay::types::deserialize_events;
use analytics_relay::{
    AnalyticsConfig, AnalyticsService, EventRecord, FileStore, HttpTransport, PersistentStore,
    PENDING_EVENTS_KEY,
};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use parking_lot::Mutex;
use tempfile::TempDir;

#[derive(Clone, Default)]
struct Collector {
    batches: Arc<Mutex<Vec<Vec<EventRecord>>>>,
    failing: Arc<AtomicBool>,
}

impl Collector {
    fn batches(&self) -> Vec<Vec<EventRecord>> {
        self.batches.lock().clone()
    }
}

async fn receive(State(collector): State<Collector>, body: String) -> StatusCode {
    collector.batches.lock().push(deserialize_events(&body));
    if collector.failing.load(Ordering::SeqCst) {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    }
}

async fn spawn_collector() -> (String, Collector) {
    let collector = Collector::default();
    let app = Router::new()
        .route("/events", post(receive))
        .with_state(collector.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/events", addr), collector)
}

fn test_config(url: &str, dir: &TempDir) -> AnalyticsConfig {
    let mut config = AnalyticsConfig::new(url);
    config.cooldown_before_send = 0.1;
    config.networking_timeout_seconds = 2;
    config.networking_wait_seconds_for_next_try = 0.3;
    config.store_path = dir.path().join("prefs.json");
    config
}

fn start(config: &AnalyticsConfig) -> (AnalyticsService<HttpTransport>, Arc<FileStore>) {
    let store = Arc::new(FileStore::open(&config.store_path).unwrap());
    let transport = HttpTransport::new(config.server_url.clone()).unwrap();
    let service = AnalyticsService::new(config, store.clone(), transport);
    (service, store)
}

fn persisted(store: &FileStore) -> Vec<EventRecord> {
    deserialize_events(&store.get_string(PENDING_EVENTS_KEY, ""))
}

#[tokio::test]
async fn test_single_event_round_trip() {
    let dir = TempDir::new().unwrap();
    let (url, collector) = spawn_collector().await;
    let (service, store) = start(&test_config(&url, &dir));

    service.track_event("a", "1");
    service.wait_until_idle().await;

    assert_eq!(collector.batches(), vec![vec![EventRecord::new("a", "1")]]);
    assert!(persisted(&store).is_empty());
    assert_eq!(service.pending_count(), 0);
}

#[tokio::test]
async fn test_burst_is_sent_as_one_request() {
    let dir = TempDir::new().unwrap();
    let (url, collector) = spawn_collector().await;
    let mut config = test_config(&url, &dir);
    config.cooldown_before_send = 0.5;
    let (service, _store) = start(&config);

    service.track_event("event_type_3", "data4");
    service.track_event("event_type_3", "data5");
    service.track_event("event_type_3", "data6");
    service.wait_until_idle().await;

    assert_eq!(
        collector.batches(),
        vec![vec![
            EventRecord::new("event_type_3", "data4"),
            EventRecord::new("event_type_3", "data5"),
            EventRecord::new("event_type_3", "data6"),
        ]]
    );
}

#[tokio::test]
async fn test_cap_drops_oldest_on_success() {
    let dir = TempDir::new().unwrap();
    let (url, collector) = spawn_collector().await;
    let mut config = test_config(&url, &dir);
    config.max_messages_for_save = 2;
    let (service, store) = start(&config);

    for i in 0..5 {
        service.track_event("t", &i.to_string());
    }
    service.wait_until_idle().await;

    assert_eq!(
        collector.batches(),
        vec![vec![EventRecord::new("t", "3"), EventRecord::new("t", "4")]]
    );
    assert_eq!(service.pending_count(), 0);
    assert!(persisted(&store).is_empty());
}

#[tokio::test]
async fn test_failed_delivery_is_persisted_and_retried() {
    let dir = TempDir::new().unwrap();
    let (url, collector) = spawn_collector().await;
    collector.failing.store(true, Ordering::SeqCst);
    let mut config = test_config(&url, &dir);
    config.networking_wait_seconds_for_next_try = 1.0;
    let (service, store) = start(&config);

    for i in 0..5 {
        service.track_event("t", &i.to_string());
    }
    let queued = service.pending_events();

    // First attempt lands at ~0.1s, the retry not before ~1.2s
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(collector.batches().len(), 1);
    assert_eq!(service.pending_events(), queued);
    assert_eq!(persisted(&store), queued);

    collector.failing.store(false, Ordering::SeqCst);
    service.track_event("t", "5");
    service.wait_until_idle().await;

    let batches = collector.batches();
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[1].len(), 6);
    assert!(persisted(&store).is_empty());
}

#[tokio::test]
async fn test_unreachable_collector_keeps_events_on_disk() {
    let dir = TempDir::new().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}/events", listener.local_addr().unwrap());
    drop(listener);

    let mut config = test_config(&url, &dir);
    config.networking_wait_seconds_for_next_try = 30.0;
    let (service, _store) = start(&config);

    service.track_event("a", "1");
    service.track_event("b", "2");
    tokio::time::sleep(Duration::from_millis(800)).await;

    // A fresh store on the same file sees what the failed attempt saved
    let reopened = FileStore::open(&config.store_path).unwrap();
    assert_eq!(
        persisted(&reopened),
        vec![EventRecord::new("a", "1"), EventRecord::new("b", "2")]
    );
    assert_eq!(service.pending_count(), 2);
}

#[tokio::test]
async fn test_restart_reloads_pending_events() {
    let dir = TempDir::new().unwrap();
    let (url, collector) = spawn_collector().await;
    let config = test_config(&url, &dir);

    {
        let store = FileStore::open(&config.store_path).unwrap();
        store
            .set_string(
                PENDING_EVENTS_KEY,
                r#"{"events":[{"type":"old","data":"1"},{"type":"old","data":"2"}]}"#,
            )
            .unwrap();
    }

    let (service, _store) = start(&config);
    assert_eq!(service.pending_count(), 2);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(collector.batches().is_empty());

    service.track_event("new", "3");
    service.wait_until_idle().await;

    assert_eq!(
        collector.batches(),
        vec![vec![
            EventRecord::new("old", "1"),
            EventRecord::new("old", "2"),
            EventRecord::new("new", "3"),
        ]]
    );
}

#[tokio::test]
async fn test_focus_lost_flush_survives_restart() {
    let dir = TempDir::new().unwrap();
    let (url, collector) = spawn_collector().await;
    let mut config = test_config(&url, &dir);
    config.cooldown_before_send = 30.0;

    let (service, _store) = start(&config);
    service.track_event("session_end", "42");
    service.on_focus_changed(false);
    drop(service);

    let (restarted, _store) = start(&config);
    assert_eq!(
        restarted.pending_events(),
        vec![EventRecord::new("session_end", "42")]
    );
    assert!(collector.batches().is_empty());
}
