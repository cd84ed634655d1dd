//! Event records and their wire/persisted form
//!
//! The same JSON document is used as the HTTP request body and as the
//! value stored under the pending-events key:
//!
//! ```text
//! { "events": [ { "type": "level_start", "data": "3" }, ... ] }
//! ```

use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single reported occurrence: a type tag plus an opaque payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type", default)]
    pub event_type: String,
    #[serde(default)]
    pub data: String,
}

impl EventRecord {
    /// Create a new event record
    pub fn new(event_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            data: data.into(),
        }
    }
}

/// Envelope around a batch of events
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventList {
    #[serde(default)]
    pub events: Vec<EventRecord>,
}

/// Borrowed envelope so batch views can be encoded without cloning
#[derive(Serialize)]
struct EventListRef<'a> {
    events: &'a [EventRecord],
}

impl EventList {
    /// Parse an event list, failing on malformed JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// Encode a sequence of events in the `{"events": [...]}` envelope
pub fn serialize_events(events: &[EventRecord]) -> String {
    // A list of plain string pairs always encodes.
    serde_json::to_string(&EventListRef { events }).unwrap_or_else(|_| String::from("{\"events\":[]}"))
}

/// Decode a persisted or received event list
///
/// Empty input yields an empty sequence. Malformed input is logged and
/// also yields an empty sequence.
pub fn deserialize_events(json: &str) -> Vec<EventRecord> {
    if json.trim().is_empty() {
        return Vec::new();
    }

    match EventList::from_json(json) {
        Ok(list) => list.events,
        Err(e) => {
            warn!(error = %e, "Discarding unreadable pending events");
            Vec::new()
        }
    }
}
