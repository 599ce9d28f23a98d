use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

const DEFAULT_SUBSCRIBER_CAPACITY: usize = 256;
const DEFAULT_HISTORY_CAPACITY: usize = 1024;

/// Signals published by the stores for whoever renders them.
///
/// Producers never know who listens; the renderer, a CLI progress printer and
/// tests are all just subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Drop all rendered geometry.
    ResetMap,
    /// Per-point columns or the thumbnail atlas changed.
    UpdateGeometry,
    /// Re-fit the base transform to the data; `instant` skips animation.
    FitViewport { instant: bool },
    ResetPanAndZoom,
    /// Rebuild channel arrays from the configured fallbacks.
    RegenerateAttributeArrays,
    ShowResultsTab,
    ShowScoreInfo,
    Progress {
        current_step: u32,
        total_steps: u32,
        step_title: String,
    },
    JobFinished { map_id: String },
    /// User-visible failure, e.g. a backend-reported job error.
    ErrorNotice { message: String },
    /// User-visible information that is not an error.
    Notice { message: String },
    LoginRequired,
    CollectionChanged {
        collection_id: Option<String>,
        class_name: Option<String>,
    },
    CollectionUpdated { collection_id: String },
}

/// One published signal with its publication order.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub sequence: u64,
    pub signal: Signal,
}

#[derive(Debug)]
struct Recorded {
    next_sequence: u64,
    capacity: usize,
    events: VecDeque<Event>,
}

/// Shared publish/subscribe bus.
///
/// Cloning yields another handle onto the same bus. Every event is fanned out
/// to live subscribers. The most recent ones are also kept in a bounded
/// history until drained; the oldest fall out once it is full.
#[derive(Debug, Clone)]
pub struct EventBus {
    recorded: Arc<Mutex<Recorded>>,
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_history(DEFAULT_HISTORY_CAPACITY)
    }

    /// A bus keeping at most `capacity` past events. Zero keeps none.
    pub fn with_history(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_SUBSCRIBER_CAPACITY);
        Self {
            recorded: Arc::new(Mutex::new(Recorded {
                next_sequence: 0,
                capacity,
                events: VecDeque::with_capacity(capacity.min(DEFAULT_HISTORY_CAPACITY)),
            })),
            tx,
        }
    }

    pub fn emit(&self, signal: Signal) {
        let event = {
            let mut rec = self.recorded.lock();
            let event = Event {
                sequence: rec.next_sequence,
                signal,
            };
            rec.next_sequence += 1;
            if rec.capacity > 0 {
                if rec.events.len() == rec.capacity {
                    rec.events.pop_front();
                }
                rec.events.push_back(event.clone());
            }
            event
        };
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn events(&self) -> Vec<Event> {
        self.recorded.lock().events.iter().cloned().collect()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.recorded
            .lock()
            .events
            .iter()
            .map(|e| e.signal.clone())
            .collect()
    }

    pub fn drain(&self) -> Vec<Event> {
        self.recorded.lock().events.drain(..).collect()
    }
}
