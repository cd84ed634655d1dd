//! Analytics Relay - Binary Entry Point
//!
//! Tracks one event per stdin line and relays them to the configured
//! collector. Lines are either `type data...` or `{"type": .., "data": ..}`.
//! Ctrl+C flushes pending events to the store before exiting.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use analytics_relay::{
    AnalyticsConfig, AnalyticsResult, AnalyticsService, EventRecord, FileStore, HttpTransport,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> AnalyticsResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config_path = env::args()
        .nth(1)
        .or_else(|| env::var("ANALYTICS_CONFIG").ok())
        .map(PathBuf::from);
    let config = AnalyticsConfig::load(config_path.as_deref())?;

    let store = Arc::new(FileStore::open(&config.store_path)?);
    let transport = HttpTransport::new(config.server_url.clone())?;
    let analytics = AnalyticsService::new(&config, store, transport);

    info!(
        url = %config.server_url,
        store = %config.store_path.display(),
        pending = analytics.pending_count(),
        "{} {} ready",
        analytics_relay::NAME,
        analytics_relay::VERSION
    );

    // Ctrl+C stands in for the host losing foreground
    let on_interrupt = analytics.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        on_interrupt.on_focus_changed(false);
        info!(pending = on_interrupt.pending_count(), "Flushed pending events, exiting");
        std::process::exit(130);
    }) {
        warn!(error = %e, "Could not install Ctrl+C handler");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(event) = parse_line(&line) {
            analytics.track_event(&event.event_type, &event.data);
        }
    }

    analytics.flush_pending();
    analytics.wait_until_idle().await;
    Ok(())
}

fn parse_line(line: &str) -> Option<EventRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    if line.starts_with('{') {
        return match serde_json::from_str::<EventRecord>(line) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!(error = %e, "Skipping malformed event line");
                None
            }
        };
    }

    let (event_type, data) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    Some(EventRecord::new(event_type, data.trim_start()))
}
