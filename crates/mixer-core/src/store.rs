use crate::tags::{Tag, TagKind, CATALOG, TAG_COUNT};
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Live tag values. Owned by the simulator; everyone else sees [`TagSnapshot`]s.
#[derive(Debug, Clone, PartialEq)]
pub struct TagStore {
    values: [f64; TAG_COUNT],
}

impl TagStore {
    /// Start-up configuration of the tank: empty, cold, filling from inlet 1.
    pub fn initial() -> Self {
        let mut values = [0.0; TAG_COUNT];
        for info in CATALOG.iter() {
            values[info.tag.index()] = info.initial;
        }
        Self { values }
    }

    pub fn get(&self, tag: Tag) -> f64 {
        self.values[tag.index()]
    }

    /// Writes a tag value.
    ///
    /// # Panics
    ///
    /// Panics on a non-finite value, or on anything but 0/1 for a discrete tag.
    pub fn set(&mut self, tag: Tag, value: f64) {
        assert!(value.is_finite(), "{tag} set to non-finite value {value}");
        if tag.kind() == TagKind::Discrete {
            assert!(
                value == 0.0 || value == 1.0,
                "discrete tag {tag} set to {value}"
            );
        }
        self.values[tag.index()] = value;
    }

    pub fn flag(&self, tag: Tag) -> bool {
        self.get(tag) != 0.0
    }

    pub fn set_flag(&mut self, tag: Tag, on: bool) {
        self.set(tag, if on { 1.0 } else { 0.0 });
    }

    /// Lookup by external name.
    ///
    /// # Panics
    ///
    /// Panics if `name` is not in the catalog.
    pub fn get_named(&self, name: &str) -> f64 {
        match Tag::from_name(name) {
            Ok(tag) => self.get(tag),
            Err(e) => panic!("{e}"),
        }
    }

    pub fn snapshot(&self) -> TagSnapshot {
        TagSnapshot {
            values: self.values,
        }
    }
}

impl Default for TagStore {
    fn default() -> Self {
        Self::initial()
    }
}

/// Immutable copy of every tag value, in catalog order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TagSnapshot {
    values: [f64; TAG_COUNT],
}

impl TagSnapshot {
    pub fn get(&self, tag: Tag) -> f64 {
        self.values[tag.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        Tag::ALL
            .into_iter()
            .map(move |tag| (tag.name(), self.get(tag)))
    }
}

impl Default for TagSnapshot {
    fn default() -> Self {
        TagStore::initial().snapshot()
    }
}

impl Serialize for TagSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(TAG_COUNT))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, &value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_configuration() {
        let store = TagStore::initial();
        assert_eq!(store.get(Tag::LevelPv), 0.0);
        assert_eq!(store.get(Tag::TemperaturePv), 71.816);
        assert!(store.flag(Tag::Inlet1Cmd));
        assert!(store.flag(Tag::Pump1Cmd));
        assert!(!store.flag(Tag::Inlet2Cmd));
        assert_eq!(store.get(Tag::MixingTimePv), 50.0);
        assert_eq!(store.get_named("Pump2.Speed.SP"), 11.24);
    }

    #[test]
    fn snapshot_is_detached() {
        let mut store = TagStore::initial();
        let before = store.snapshot();
        store.set(Tag::LevelPv, 42.0);
        assert_eq!(before.get(Tag::LevelPv), 0.0);
        assert_eq!(store.snapshot().get(Tag::LevelPv), 42.0);
    }

    #[test]
    fn snapshot_iterates_in_catalog_order() {
        let names: Vec<_> = TagStore::initial().snapshot().iter().map(|(n, _)| n).collect();
        assert_eq!(names.len(), TAG_COUNT);
        assert_eq!(names[0], "Temperature.PV");
        assert_eq!(names[1], "Level.PV");
        assert_eq!(names[TAG_COUNT - 1], "Outlet.CMD");
    }

    #[test]
    fn snapshot_serializes_as_ordered_object() {
        let json = serde_json::to_string(&TagStore::initial().snapshot()).unwrap();
        assert!(json.starts_with(r#"{"Temperature.PV":71.816,"Level.PV":0.0,"#));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["Pump1.Speed.SP"], 16.37);
    }

    #[test]
    #[should_panic(expected = "discrete tag")]
    fn rejects_non_binary_discrete_write() {
        TagStore::initial().set(Tag::OutletCmd, 0.5);
    }

    #[test]
    #[should_panic(expected = "non-finite")]
    fn rejects_nan_write() {
        TagStore::initial().set(Tag::LevelPv, f64::NAN);
    }

    #[test]
    #[should_panic(expected = "unknown tag name")]
    fn unknown_name_is_fatal() {
        TagStore::initial().get_named("Level.SP");
    }
}
