//! Tag catalog for the mixing tank.
//!
//! Every process variable the simulator drives is listed here once, with its
//! dotted external name, its kind and its start-up value. The catalog order is
//! the order in which snapshots are published.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of tags in the catalog.
pub const TAG_COUNT: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("unknown tag name: {name}")]
    UnknownTag { name: String },
}

/// Value domain of a tag. All values are stored as `f64`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    /// Any finite value.
    Analog,
    /// Commands, limit switches and valve positions: 0 or 1.
    Discrete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Tag {
    TemperaturePv,
    LevelPv,
    Pump1Pv,
    Pump1Cmd,
    Pump1SpeedSp,
    Pump2Pv,
    Pump2Cmd,
    Pump2SpeedSp,
    Inlet1Position,
    Inlet1Cmd,
    Inlet2Position,
    Inlet2Cmd,
    Inlet1Cls,
    Inlet1Ols,
    Inlet2Cls,
    Inlet2Ols,
    OutletCls,
    OutletOls,
    AgitatorSpeedPv,
    AgitatorCmd,
    AgitatorPv,
    MixingTimePv,
    OutletPosition,
    OutletCmd,
}

#[derive(Debug, Clone, Copy)]
pub struct TagInfo {
    pub tag: Tag,
    pub name: &'static str,
    pub kind: TagKind,
    pub initial: f64,
}

const fn analog(tag: Tag, name: &'static str, initial: f64) -> TagInfo {
    TagInfo {
        tag,
        name,
        kind: TagKind::Analog,
        initial,
    }
}

const fn discrete(tag: Tag, name: &'static str, initial: f64) -> TagInfo {
    TagInfo {
        tag,
        name,
        kind: TagKind::Discrete,
        initial,
    }
}

/// Catalog in publish order. Index `i` describes the tag whose discriminant is `i`.
pub const CATALOG: [TagInfo; TAG_COUNT] = [
    analog(Tag::TemperaturePv, "Temperature.PV", 71.816),
    analog(Tag::LevelPv, "Level.PV", 0.0),
    analog(Tag::Pump1Pv, "Pump1.PV", 10.0),
    discrete(Tag::Pump1Cmd, "Pump1.CMD", 1.0),
    analog(Tag::Pump1SpeedSp, "Pump1.Speed.SP", 16.37),
    analog(Tag::Pump2Pv, "Pump2.PV", 0.0),
    discrete(Tag::Pump2Cmd, "Pump2.CMD", 0.0),
    analog(Tag::Pump2SpeedSp, "Pump2.Speed.SP", 11.24),
    discrete(Tag::Inlet1Position, "Inlet1.Position", 1.0),
    discrete(Tag::Inlet1Cmd, "Inlet1.CMD", 1.0),
    discrete(Tag::Inlet2Position, "Inlet2.Position", 0.0),
    discrete(Tag::Inlet2Cmd, "Inlet2.CMD", 0.0),
    discrete(Tag::Inlet1Cls, "Inlet1.CLS", 0.0),
    discrete(Tag::Inlet1Ols, "Inlet1.OLS", 1.0),
    discrete(Tag::Inlet2Cls, "Inlet2.CLS", 1.0),
    discrete(Tag::Inlet2Ols, "Inlet2.OLS", 0.0),
    discrete(Tag::OutletCls, "Outlet.CLS", 0.0),
    discrete(Tag::OutletOls, "Outlet.OLS", 0.0),
    analog(Tag::AgitatorSpeedPv, "Agitator.Speed.PV", 3000.0),
    discrete(Tag::AgitatorCmd, "Agitator.CMD", 0.0),
    analog(Tag::AgitatorPv, "Agitator.PV", 0.0),
    analog(Tag::MixingTimePv, "MixingTime.PV", 50.0),
    discrete(Tag::OutletPosition, "Outlet.Position", 0.0),
    discrete(Tag::OutletCmd, "Outlet.CMD", 0.0),
];

impl Tag {
    pub const ALL: [Tag; TAG_COUNT] = {
        let mut all = [Tag::TemperaturePv; TAG_COUNT];
        let mut i = 0;
        while i < TAG_COUNT {
            all[i] = CATALOG[i].tag;
            i += 1;
        }
        all
    };

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn info(self) -> TagInfo {
        CATALOG[self as usize]
    }

    /// Dotted external name, e.g. `Pump1.Speed.SP`.
    pub const fn name(self) -> &'static str {
        self.info().name
    }

    pub const fn kind(self) -> TagKind {
        self.info().kind
    }

    pub fn from_name(name: &str) -> Result<Tag, TagError> {
        CATALOG
            .iter()
            .find(|info| info.name == name)
            .map(|info| info.tag)
            .ok_or_else(|| TagError::UnknownTag {
                name: name.to_string(),
            })
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tag::from_name(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_index_matches_discriminant() {
        for (i, info) in CATALOG.iter().enumerate() {
            assert_eq!(info.tag.index(), i, "{} out of place", info.name);
        }
    }

    #[test]
    fn names_are_unique_and_dotted() {
        for (i, a) in CATALOG.iter().enumerate() {
            assert!(a.name.contains('.'));
            for b in &CATALOG[i + 1..] {
                assert_ne!(a.name, b.name);
            }
        }
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(Tag::from_name("Pump1.Speed.SP"), Ok(Tag::Pump1SpeedSp));
        assert_eq!("Outlet.CMD".parse::<Tag>(), Ok(Tag::OutletCmd));
        assert!(matches!(
            Tag::from_name("Pump3.PV"),
            Err(TagError::UnknownTag { .. })
        ));
    }

    #[test]
    fn discrete_tags_start_binary() {
        for info in CATALOG.iter().filter(|i| i.kind == TagKind::Discrete) {
            assert!(info.initial == 0.0 || info.initial == 1.0, "{}", info.name);
        }
    }
}
