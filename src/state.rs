// file: src/state.rs
// description: shared broadcaster counters, separated from delivery logic

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::types::ConnectionState;

#[derive(Debug)]
pub struct BroadcasterState {
    pub started_at: DateTime<Utc>,
    pub subscriber_count: AtomicUsize,
    pub changes_broadcast: AtomicU64,
    pub duplicates_collapsed: AtomicU64,
    pub source_failures: AtomicU64,
    pub activations: AtomicU64,
    last_change: Mutex<Option<(DateTime<Utc>, ConnectionState)>>,
}

impl Default for BroadcasterState {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            subscriber_count: AtomicUsize::new(0),
            changes_broadcast: AtomicU64::new(0),
            duplicates_collapsed: AtomicU64::new(0),
            source_failures: AtomicU64::new(0),
            activations: AtomicU64::new(0),
            last_change: Mutex::new(None),
        }
    }
}

impl BroadcasterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_change(&self, state: ConnectionState) {
        self.changes_broadcast.fetch_add(1, Ordering::Relaxed);
        *self.last_change.lock() = Some((Utc::now(), state));
    }

    pub fn record_duplicate(&self) {
        self.duplicates_collapsed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.source_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_activation(&self) {
        self.activations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_subscribers(&self, count: usize) {
        self.subscriber_count.store(count, Ordering::Relaxed);
    }

    pub fn last_change(&self) -> Option<(DateTime<Utc>, ConnectionState)> {
        *self.last_change.lock()
    }
}

pub type SharedBroadcasterState = Arc<BroadcasterState>;
