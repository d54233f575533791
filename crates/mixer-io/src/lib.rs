pub mod bridge;
pub mod metrics;
pub mod protocol;
pub mod publisher;

pub use bridge::{Bridge, BridgeConfig, BridgeError, BridgeEvent};
pub use metrics::{init_metrics, record_snapshot, record_tick, serve_metrics, MetricsError};
pub use protocol::{HelloMsg, IncomingMessage, ProtocolVersion, StateMsg};
pub use publisher::{run_publisher, EquipmentSet, MirroredTags, Publisher, DEFAULT_EQUIPMENT_COUNT};
