//! Data types for the analytics relay
//!
//! This module contains the event record model and its JSON encoding.

mod event;

pub use event::{deserialize_events, serialize_events, EventList, EventRecord};

/// Store key under which undelivered events are persisted
pub const PENDING_EVENTS_KEY: &str = "pendingEvents";
