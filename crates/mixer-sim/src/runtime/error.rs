use mixer_core::ConfigError;
use mixer_io::{BridgeError, MetricsError};
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop the host before or while it starts up. Once the
/// scheduler runs, publisher problems are logged instead.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("missing value for {flag}")]
    MissingValue { flag: String },
    #[error("invalid value for {flag}: {value:?}")]
    InvalidArgument { flag: String, value: String },
    #[error("unknown argument {0:?} (try --help)")]
    UnknownArgument(String),
    #[error("invalid setpoint override: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error(transparent)]
    Metrics(#[from] MetricsError),
    #[error("failed to open audit log {path}: {source}")]
    Audit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to open log directory: {0}")]
    LogFile(#[from] tracing_appender::rolling::InitError),
    #[error("failed to install tracing subscriber: {0}")]
    Logging(String),
    #[cfg(not(feature = "opcua"))]
    #[error("OPC UA requested for {endpoint} but the `opcua` feature is not enabled")]
    OpcuaUnavailable { endpoint: String },
    #[cfg(feature = "opcua")]
    #[error("invalid OPC UA endpoint {0:?}")]
    OpcuaEndpoint(String),
    #[error("failed to install interrupt handler: {0}")]
    Signal(#[from] ctrlc::Error),
    #[error("scheduler thread panicked")]
    SchedulerPanicked,
}
