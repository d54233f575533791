use crate::simulator::Phase;
use crate::store::TagSnapshot;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Everything a publisher needs about one completed tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ProcessSnapshot {
    /// Tick that produced this state; 0 before the first tick.
    pub tick: u64,
    pub timestamp_us: u64,
    pub unix_us: u64,
    pub phase: Phase,
    pub mix_ticks: u32,
    pub tags: TagSnapshot,
}

/// Hand-off point between the scheduler thread and publisher threads.
///
/// The scheduler replaces the whole snapshot after each tick; readers copy it
/// out, so a reader never observes values from two different ticks.
pub struct StateExchange {
    state: RwLock<ProcessSnapshot>,
    published: AtomicU64,
}

impl StateExchange {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(ProcessSnapshot::default()),
            published: AtomicU64::new(0),
        }
    }

    /// Called by the scheduler once per completed tick.
    pub fn publish_state(&self, snapshot: ProcessSnapshot) {
        let mut slot = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *slot = snapshot;
        self.published.fetch_add(1, Ordering::Release);
    }

    /// Called by publishers; never blocks the scheduler for longer than a copy.
    pub fn read_state(&self) -> ProcessSnapshot {
        match self.state.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Number of snapshots published so far.
    pub fn published_count(&self) -> u64 {
        self.published.load(Ordering::Acquire)
    }
}

impl Default for StateExchange {
    fn default() -> Self {
        Self::new()
    }
}
