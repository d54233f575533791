use mixer_core::{Phase, ProcessSnapshot, Tag, TagStore};
use mixer_io::protocol::{IncomingMessage, ProtocolVersion, StateMsg};
use mixer_io::EquipmentSet;

#[test]
fn parses_hello_message() {
    let raw = r#"{
        "type":"hello",
        "protocol_version":{"major":1,"minor":0},
        "client_id":"hmi-panel"
    }"#;

    let msg = IncomingMessage::parse(raw).expect("hello should parse");
    let IncomingMessage::Hello(hello) = msg;
    assert!(hello.protocol_version.is_supported());
    assert_eq!(hello.protocol_version, ProtocolVersion::v1());
    assert_eq!(hello.client_id.as_deref(), Some("hmi-panel"));
}

#[test]
fn hello_defaults_missing_fields() {
    let msg = IncomingMessage::parse(r#"{"type":"hello"}"#).expect("hello should parse");
    let IncomingMessage::Hello(hello) = msg;
    assert!(!hello.protocol_version.is_supported());
    assert!(hello.client_id.is_none());
}

#[test]
fn ignores_unknown_and_malformed_lines() {
    assert!(IncomingMessage::parse(r#"{"type":"write","tag":"Level.PV","value":1}"#).is_none());
    assert!(IncomingMessage::parse(r#"{"no_type":true}"#).is_none());
    assert!(IncomingMessage::parse("garbage").is_none());
}

#[test]
fn state_message_layout() {
    let mut store = TagStore::initial();
    store.set(Tag::TemperaturePv, 159.416);
    let snapshot = ProcessSnapshot {
        tick: 78,
        timestamp_us: 1_000,
        unix_us: 1_700_000_000_000_000,
        phase: Phase::Mixing,
        mix_ticks: 6,
        tags: store.snapshot(),
    };
    let equipment = EquipmentSet::default();
    let value = serde_json::to_value(StateMsg::new(9, &snapshot, &equipment)).unwrap();

    assert_eq!(value["type"], "state");
    assert_eq!(value["sequence"], 9);
    assert_eq!(value["tick"], 78);
    assert_eq!(value["phase"], "mixing");
    assert_eq!(value["mix_ticks"], 6);
    assert_eq!(value["unix_us"], 1_700_000_000_000_000u64);

    let equipment = value["equipment"].as_object().unwrap();
    let names: Vec<&str> = equipment.keys().map(String::as_str).collect();
    assert_eq!(names, ["Mixer100", "Mixer200", "Mixer300", "Mixer400"]);
    for tags in equipment.values() {
        let tags = tags.as_object().unwrap();
        assert_eq!(tags.len(), 24);
        assert_eq!(tags["Temperature.PV"], 159.416);
        assert_eq!(tags["MixingTime.PV"], 50.0);
    }
}
