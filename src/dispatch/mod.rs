//! Dispatch scheduler - debounced batching, persistence and retry
//!
//! # Architecture
//!
//! ```text
//! track_event ──► append ──► Idle? ──yes──► spawn drain loop
//!                                │
//!                                no (running loop picks it up)
//!
//! drain loop (while queue non-empty):
//! ┌──────────┐    ┌────────────┐    ┌──────────┐──ok──► clear + persist empty
//! │ cooldown │───►│ batch view │───►│   send   │
//! └──────────┘    └────────────┘    └──────────┘──err─► persist + backoff wait
//! ```
//!
//! The queue and the Idle/Draining flag share one mutex, so an append can
//! never slip in between the loop's final emptiness check and its switch
//! back to Idle. Store writes happen outside that mutex; snapshots carry a
//! sequence number so an older one never overwrites a newer one.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tracing::{debug, info, warn};

use crate::config::AnalyticsConfig;
use crate::queue::EventQueue;
use crate::store::PersistentStore;
use crate::transport::{DeliveryOutcome, Transport};
use crate::types::{deserialize_events, serialize_events, EventRecord, PENDING_EVENTS_KEY};

/// Whether a drain loop is currently running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Idle,
    Draining,
}

struct QueueState {
    queue: EventQueue,
    draining: bool,
    /// Sequence number of the latest snapshot taken for the store
    snapshot_seq: u64,
}

/// Serialized queue contents waiting to be written to the store
struct Snapshot {
    seq: u64,
    json: String,
}

struct Shared<T> {
    state: Mutex<QueueState>,
    store: Arc<dyn PersistentStore>,
    /// Sequence number of the newest snapshot handed to the store
    written_seq: Mutex<u64>,
    transport: T,
    idle: Notify,
    runtime: Handle,
    cooldown: Duration,
    request_timeout: Duration,
    retry_wait: Duration,
    max_messages: usize,
}

/// Owns the Draining state for one drain loop
///
/// Dropping it while armed (the loop panicked, or its task was dropped
/// before running) puts the scheduler back to Idle.
struct DrainingFlag<T: Transport> {
    shared: Arc<Shared<T>>,
    armed: bool,
}

impl<T: Transport> Drop for DrainingFlag<T> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Drain loop ended unexpectedly, returning to idle");
            self.shared.state.lock().draining = false;
            self.shared.idle.notify_waiters();
        }
    }
}

/// Handle to the event relay
///
/// Cloning is cheap; all clones feed the same queue and share one drain
/// loop. Construct one per process and pass it to whatever reports events.
pub struct AnalyticsService<T: Transport> {
    shared: Arc<Shared<T>>,
}

impl<T: Transport> Clone for AnalyticsService<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Transport> AnalyticsService<T> {
    /// Create the service, reloading events left over from a previous run
    ///
    /// Must be called from within a tokio runtime; the drain loop is spawned
    /// on that runtime. Reloaded events are not sent until the next
    /// [`track_event`](Self::track_event) starts a drain loop.
    pub fn new(config: &AnalyticsConfig, store: Arc<dyn PersistentStore>, transport: T) -> Self {
        Self::with_runtime(config, store, transport, Handle::current())
    }

    /// Create the service with an explicit runtime handle
    pub fn with_runtime(
        config: &AnalyticsConfig,
        store: Arc<dyn PersistentStore>,
        transport: T,
        runtime: Handle,
    ) -> Self {
        let pending = deserialize_events(&store.get_string(PENDING_EVENTS_KEY, ""));
        if !pending.is_empty() {
            info!(count = pending.len(), "Loaded pending events");
        }

        let mut queue = EventQueue::from_events(pending);
        if config.trim_live_queue {
            queue = queue.with_trim_to(config.max_messages_for_save);
        }

        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(QueueState {
                    queue,
                    draining: false,
                    snapshot_seq: 0,
                }),
                store,
                written_seq: Mutex::new(0),
                transport,
                idle: Notify::new(),
                runtime,
                cooldown: config.cooldown(),
                request_timeout: config.request_timeout(),
                retry_wait: config.retry_wait(),
                max_messages: config.max_messages_for_save,
            }),
        }
    }

    /// Record an event and make sure a drain loop is running
    ///
    /// Never blocks on the store or the network; callable from any thread.
    pub fn track_event(&self, event_type: &str, data: &str) {
        debug!(event_type, data, "Tracking event");

        let start_loop = {
            let mut state = self.shared.state.lock();
            state.queue.append(EventRecord::new(event_type, data));
            !std::mem::replace(&mut state.draining, true)
        };

        if start_loop {
            let flag = DrainingFlag {
                shared: Arc::clone(&self.shared),
                armed: true,
            };
            self.shared.runtime.spawn(Shared::drain(flag));
        }
    }

    /// Host focus callback; losing focus flushes pending events to the store
    pub fn on_focus_changed(&self, has_focus: bool) {
        if !has_focus {
            self.flush_pending();
        }
    }

    /// Synchronously persist the current queue, whatever the dispatch state
    ///
    /// The write happens on the calling thread after the queue lock is
    /// released, so concurrent `track_event` calls are not held up.
    pub fn flush_pending(&self) {
        let snapshot = self.shared.snapshot();
        self.shared.write_snapshot(snapshot);
    }

    pub fn state(&self) -> DispatchState {
        if self.shared.state.lock().draining {
            DispatchState::Draining
        } else {
            DispatchState::Idle
        }
    }

    /// Number of events waiting for delivery
    pub fn pending_count(&self) -> usize {
        self.shared.state.lock().queue.count()
    }

    /// Copy of the events waiting for delivery, oldest first
    pub fn pending_events(&self) -> Vec<EventRecord> {
        self.shared.state.lock().queue.contents().to_vec()
    }

    /// Wait until no drain loop is running
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if !self.shared.state.lock().draining {
                return;
            }
            notified.await;
        }
    }
}

impl<T: Transport> Shared<T> {
    async fn drain(mut flag: DrainingFlag<T>) {
        let shared = Arc::clone(&flag.shared);

        loop {
            tokio::time::sleep(shared.cooldown).await;

            let (body, batch_len) = {
                let state = shared.state.lock();
                let excluded = state.queue.excluded_by(shared.max_messages);
                if excluded > 0 {
                    warn!(
                        queued = state.queue.count(),
                        cap = shared.max_messages,
                        excluded,
                        "Pending events over limit, oldest are left out of the batch"
                    );
                }
                let view = state.queue.batch_view(shared.max_messages);
                (serialize_events(view), view.len())
            };

            debug!(batch_len, "Sending batch");
            match shared.transport.send(body, shared.request_timeout).await {
                DeliveryOutcome::Delivered => {
                    let snapshot = {
                        let mut state = shared.state.lock();
                        let dropped = state.queue.count().saturating_sub(batch_len);
                        if dropped > 0 {
                            warn!(dropped, "Clearing events that were over the batch limit");
                        }
                        state.queue.clear();
                        Self::take_snapshot(&mut state, shared.max_messages)
                    };
                    shared.persist_in_background(snapshot).await;
                    info!(batch_len, "Delivered events");
                }
                DeliveryOutcome::Failed => {
                    let snapshot = {
                        let mut state = shared.state.lock();
                        warn!(pending = state.queue.count(), "Failed to send events, saving to store");
                        Self::take_snapshot(&mut state, shared.max_messages)
                    };
                    shared.persist_in_background(snapshot).await;
                    tokio::time::sleep(shared.retry_wait).await;
                }
            }

            let mut state = shared.state.lock();
            if state.queue.is_empty() {
                state.draining = false;
                flag.armed = false;
                drop(state);
                shared.idle.notify_waiters();
                return;
            }
        }
    }

    fn snapshot(&self) -> Snapshot {
        let mut state = self.state.lock();
        Self::take_snapshot(&mut state, self.max_messages)
    }

    /// Serialize the capped view of the queue, tagged with a fresh sequence number
    fn take_snapshot(state: &mut QueueState, max_messages: usize) -> Snapshot {
        state.snapshot_seq += 1;
        Snapshot {
            seq: state.snapshot_seq,
            json: serialize_events(state.queue.batch_view(max_messages)),
        }
    }

    /// Run the store write on the blocking pool
    async fn persist_in_background(self: &Arc<Self>, snapshot: Snapshot) {
        let shared = Arc::clone(self);
        if let Err(e) = tokio::task::spawn_blocking(move || shared.write_snapshot(snapshot)).await {
            warn!(error = %e, "Pending events write task failed");
        }
    }

    /// Write a snapshot unless a newer one already reached the store
    fn write_snapshot(&self, snapshot: Snapshot) {
        let mut written = self.written_seq.lock();
        if snapshot.seq <= *written {
            debug!(seq = snapshot.seq, "Skipping outdated pending events snapshot");
            return;
        }
        *written = snapshot.seq;

        if let Err(e) = self.store.set_string(PENDING_EVENTS_KEY, &snapshot.json) {
            warn!(error = %e, "Failed to persist pending events");
        }
    }
}
