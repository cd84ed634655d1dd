//! Insertion-ordered buffer of pending events

use crate::types::EventRecord;

/// In-memory buffer of events waiting for delivery, oldest first
///
/// By default the queue grows without limit and only [`batch_view`]
/// applies the cap. With `trim_to` set, appends drop the oldest records
/// so the live queue itself never exceeds the cap.
///
/// [`batch_view`]: EventQueue::batch_view
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    events: Vec<EventRecord>,
    trim_to: Option<usize>,
}

impl EventQueue {
    /// Create an empty, unbounded queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue pre-filled with previously persisted events
    pub fn from_events(events: Vec<EventRecord>) -> Self {
        Self {
            events,
            trim_to: None,
        }
    }

    /// Cap the live queue itself, trimming from the front
    pub fn with_trim_to(mut self, cap: usize) -> Self {
        self.trim_to = Some(cap);
        self.trim();
        self
    }

    /// Insert a record at the tail
    pub fn append(&mut self, record: EventRecord) {
        self.events.push(record);
        self.trim();
    }

    /// The most recent `cap` records, in original order
    pub fn batch_view(&self, cap: usize) -> &[EventRecord] {
        &self.events[self.excluded_by(cap)..]
    }

    /// How many of the oldest records a `cap`-sized batch view leaves out
    pub fn excluded_by(&self, cap: usize) -> usize {
        self.events.len().saturating_sub(cap)
    }

    /// Remove every record
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Number of queued records
    pub fn count(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The whole live queue
    pub fn contents(&self) -> &[EventRecord] {
        &self.events
    }

    fn trim(&mut self) {
        if let Some(cap) = self.trim_to {
            let excess = self.events.len().saturating_sub(cap);
            if excess > 0 {
                self.events.drain(..excess);
            }
        }
    }
}
