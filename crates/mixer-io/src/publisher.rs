//! Publish-side fan-out of the single simulated tank.
//!
//! The simulator models one physical process. External clients see
//! `equipment_count` identical instances (`Mixer100`, `Mixer200`, ...), all
//! mirroring the same snapshot. Multiplicity lives here and nowhere else.

use mixer_core::{ProcessSnapshot, StateExchange, TagSnapshot};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

pub const DEFAULT_EQUIPMENT_COUNT: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EquipmentSet {
    names: Vec<String>,
}

impl EquipmentSet {
    pub fn new(count: usize) -> Self {
        let names = (1..=count).map(|i| format!("Mixer{}", i * 100)).collect();
        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Serializable view: `{ "Mixer100": { tag: value, ... }, ... }`.
    pub fn mirror<'a>(&'a self, tags: &'a TagSnapshot) -> MirroredTags<'a> {
        MirroredTags {
            equipment: self,
            tags,
        }
    }
}

impl Default for EquipmentSet {
    fn default() -> Self {
        Self::new(DEFAULT_EQUIPMENT_COUNT)
    }
}

pub struct MirroredTags<'a> {
    equipment: &'a EquipmentSet,
    tags: &'a TagSnapshot,
}

impl Serialize for MirroredTags<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.equipment.len()))?;
        for name in self.equipment.names() {
            map.serialize_entry(name, self.tags)?;
        }
        map.end()
    }
}

/// Something that republishes completed ticks. Must not block for long: it
/// runs on a publisher thread that polls the exchange.
pub trait Publisher {
    fn publish(&mut self, snapshot: &ProcessSnapshot);
}

impl<F: FnMut(&ProcessSnapshot)> Publisher for F {
    fn publish(&mut self, snapshot: &ProcessSnapshot) {
        self(snapshot)
    }
}

/// Polls `exchange` every `poll_interval` and hands each new tick to
/// `publisher` exactly once, until `stop` is raised.
pub fn run_publisher<P: Publisher + ?Sized>(
    exchange: &StateExchange,
    stop: &AtomicBool,
    poll_interval: Duration,
    publisher: &mut P,
) {
    let mut last_tick: Option<u64> = None;
    while !stop.load(Ordering::Relaxed) {
        let snapshot = exchange.read_state();
        if last_tick != Some(snapshot.tick) {
            publisher.publish(&snapshot);
            last_tick = Some(snapshot.tick);
        }
        thread::sleep(poll_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mixer_core::{Tag, TagStore};
    use std::sync::{Arc, Mutex};

    #[test]
    fn equipment_names_step_by_hundred() {
        let set = EquipmentSet::default();
        assert_eq!(set.names(), ["Mixer100", "Mixer200", "Mixer300", "Mixer400"]);
        assert!(EquipmentSet::new(0).is_empty());
    }

    #[test]
    fn mirror_repeats_one_snapshot() {
        let set = EquipmentSet::new(2);
        let mut store = TagStore::initial();
        store.set(Tag::LevelPv, 123.5);
        let snap = store.snapshot();
        let json = serde_json::to_value(set.mirror(&snap)).unwrap();
        assert_eq!(json["Mixer100"]["Level.PV"], 123.5);
        assert_eq!(json["Mixer100"], json["Mixer200"]);
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn publishes_each_tick_once() {
        let exchange = Arc::new(StateExchange::new());
        let stop = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let handle = {
            let exchange = Arc::clone(&exchange);
            let stop = Arc::clone(&stop);
            let seen = Arc::clone(&seen);
            thread::spawn(move || {
                let mut record = |s: &ProcessSnapshot| seen.lock().unwrap().push(s.tick);
                run_publisher(&exchange, &stop, Duration::from_millis(1), &mut record);
            })
        };

        for tick in 1..=3 {
            thread::sleep(Duration::from_millis(20));
            exchange.publish_state(ProcessSnapshot {
                tick,
                ..Default::default()
            });
        }
        thread::sleep(Duration::from_millis(20));
        stop.store(true, Ordering::Relaxed);
        handle.join().unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3]);
    }
}
