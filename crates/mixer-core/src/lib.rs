pub mod clock;
mod invariants_proptest;
pub mod noise;
pub mod scheduler;
pub mod simulator;
pub mod store;
pub mod sync;
pub mod tags;

pub use clock::{FixedRateClock, ImmediateTicks, TickSource, TimeBase};
pub use noise::{MidpointNoise, NoiseSource, RngNoise};
pub use scheduler::{ExecutionStats, Scheduler, SchedulerConfig, TickObserver};
pub use simulator::{ConfigError, Phase, SimStatus, Simulator, SimulatorConfig, TickReport};
pub use store::{TagSnapshot, TagStore};
pub use sync::{ProcessSnapshot, StateExchange};
pub use tags::{Tag, TagError, TagKind, TAG_COUNT};
