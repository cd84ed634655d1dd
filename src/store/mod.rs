//! Persistent key-value stores
//!
//! The relay only needs a durable string slot under one well-known key
//! ([`PENDING_EVENTS_KEY`](crate::types::PENDING_EVENTS_KEY)). Hosts can
//! plug in their own storage by implementing [`PersistentStore`].
//!
//! - `FileStore`: JSON object file, rewritten atomically on every set
//! - `MemoryStore`: in-process map, for embedding and tests

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::AnalyticsResult;

/// Result type for store writes
pub type StoreResult<T> = AnalyticsResult<T>;

/// Synchronous string store that survives process restarts
pub trait PersistentStore: Send + Sync {
    /// Read the value under `key`, or `default` if nothing is stored
    fn get_string(&self, key: &str, default: &str) -> String;

    /// Store `value` under `key`, replacing any previous value
    fn set_string(&self, key: &str, value: &str) -> StoreResult<()>;
}
