mod app;
mod config;
mod error;
mod logging;
mod telemetry;

pub use app::run_from_args;
#[cfg(feature = "opcua")]
pub use config::DEFAULT_OPCUA_ENDPOINT;
#[cfg(feature = "opcua")]
pub use error::RuntimeError;
