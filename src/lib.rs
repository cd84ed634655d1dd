//! Analytics Relay
//!
//! Client-side telemetry buffering: application code reports events (a type
//! tag plus an opaque payload), the relay batches them after a short
//! debounce, POSTs them to a collector, and keeps undelivered events in a
//! persistent store across restarts and outages.
//!
//! # Modules
//!
//! - `types`: Event records and their JSON envelope
//! - `queue`: Insertion-ordered pending-event buffer with capped batch views
//! - `store`: Persistent key-value stores (file and in-memory)
//! - `transport`: HTTP delivery of serialized batches
//! - `dispatch`: The debounce/send/persist/retry scheduler
//! - `config`: Tunables with TOML and environment resolution
//! - `utils`: Atomic file writes
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use analytics_relay::{AnalyticsConfig, AnalyticsService, FileStore, HttpTransport};
//!
//! #[tokio::main]
//! async fn main() -> analytics_relay::AnalyticsResult<()> {
//!     let config = AnalyticsConfig::new("https://collector.example.com/events");
//!     let store = Arc::new(FileStore::open(&config.store_path)?);
//!     let transport = HttpTransport::new(config.server_url.clone())?;
//!     let analytics = AnalyticsService::new(&config, store, transport);
//!
//!     analytics.track_event("level_start", "3");
//!     analytics.wait_until_idle().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod queue;
pub mod store;
pub mod transport;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::AnalyticsConfig;
pub use dispatch::{AnalyticsService, DispatchState};
pub use error::{AnalyticsError, AnalyticsResult};
pub use queue::EventQueue;
pub use store::{FileStore, MemoryStore, PersistentStore};
pub use transport::{DeliveryOutcome, HttpTransport, Transport};
pub use types::{EventRecord, PENDING_EVENTS_KEY};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
