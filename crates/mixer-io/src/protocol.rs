use crate::publisher::{EquipmentSet, MirroredTags};
use mixer_core::{Phase, ProcessSnapshot};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn v1() -> Self {
        Self { major: 1, minor: 0 }
    }

    pub fn is_supported(&self) -> bool {
        self.major == 1
    }
}

/// One line of the outbound stream: the latest tick mirrored onto every
/// equipment instance.
#[derive(Serialize)]
pub struct StateMsg<'a> {
    #[serde(rename = "type")]
    pub msg_type: &'static str,
    pub protocol_version: ProtocolVersion,
    pub sequence: u64,
    pub tick: u64,
    pub timestamp_us: u64,
    pub unix_us: u64,
    pub phase: Phase,
    pub mix_ticks: u32,
    pub equipment: MirroredTags<'a>,
}

impl<'a> StateMsg<'a> {
    pub fn new(sequence: u64, snapshot: &'a ProcessSnapshot, equipment: &'a EquipmentSet) -> Self {
        Self {
            msg_type: "state",
            protocol_version: ProtocolVersion::v1(),
            sequence,
            tick: snapshot.tick,
            timestamp_us: snapshot.timestamp_us,
            unix_us: snapshot.unix_us,
            phase: snapshot.phase,
            mix_ticks: snapshot.mix_ticks,
            equipment: equipment.mirror(&snapshot.tags),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HelloMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub protocol_version: ProtocolVersion,
    #[serde(default)]
    pub client_id: Option<String>,
}

#[derive(Debug)]
pub enum IncomingMessage {
    Hello(HelloMsg),
}

impl IncomingMessage {
    /// Anything that is not a well-formed known message yields `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(line).ok()?;
        let msg_type = value.get("type")?.as_str()?;
        match msg_type {
            "hello" => serde_json::from_value(value)
                .ok()
                .map(IncomingMessage::Hello),
            _ => None,
        }
    }
}
