use crate::runtime::error::RuntimeError;
use mixer_core::{SchedulerConfig, SimulatorConfig};
use mixer_io::DEFAULT_EQUIPMENT_COUNT;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_OPCUA_ENDPOINT: &str = "opc.tcp://0.0.0.0:4840/OPCUA-Server/";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub tick_ms: u64,
    pub run_seconds: Option<u64>,
    pub run_ticks: Option<u64>,
    pub equipment: usize,
    pub seed: Option<u64>,
    pub setpoints: SimulatorConfig,
    pub bind_addr: String,
    pub bridge_enabled: bool,
    pub publish_ms: Option<u64>,
    pub json_logs: bool,
    pub log_dir: Option<PathBuf>,
    pub metrics_addr: Option<String>,
    pub audit_path: Option<PathBuf>,
    pub opcua_enabled: bool,
    pub opcua_endpoint: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            tick_ms: 1000,
            run_seconds: None,
            run_ticks: None,
            equipment: DEFAULT_EQUIPMENT_COUNT,
            seed: None,
            setpoints: SimulatorConfig::default(),
            bind_addr: "127.0.0.1:7100".to_string(),
            bridge_enabled: true,
            publish_ms: None,
            json_logs: false,
            log_dir: None,
            metrics_addr: None,
            audit_path: None,
            opcua_enabled: false,
            opcua_endpoint: DEFAULT_OPCUA_ENDPOINT.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, RuntimeError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    /// `args[0]` is the program name.
    pub fn from_args(args: &[String]) -> Result<Self, RuntimeError> {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--tick-ms" => {
                    cfg.tick_ms = parse_value(args, &mut i)?;
                    if cfg.tick_ms == 0 {
                        return Err(invalid(flag, "0"));
                    }
                }
                "--run-seconds" => cfg.run_seconds = Some(parse_value(args, &mut i)?),
                "--run-ticks" => cfg.run_ticks = Some(parse_value(args, &mut i)?),
                "--equipment" => cfg.equipment = parse_value(args, &mut i)?,
                "--seed" => cfg.seed = Some(parse_value(args, &mut i)?),
                "--pump1-speed" => cfg.setpoints.pump1_speed = Some(parse_value(args, &mut i)?),
                "--pump2-speed" => cfg.setpoints.pump2_speed = Some(parse_value(args, &mut i)?),
                "--agitator-speed" => {
                    cfg.setpoints.agitator_speed = Some(parse_value(args, &mut i)?)
                }
                "--mixing-time" => cfg.setpoints.mixing_time = Some(parse_value(args, &mut i)?),
                "--bind" => cfg.bind_addr = take_value(args, &mut i)?.to_string(),
                "--no-bridge" => cfg.bridge_enabled = false,
                "--publish-ms" => {
                    let ms: u64 = parse_value(args, &mut i)?;
                    if ms == 0 {
                        return Err(invalid(flag, "0"));
                    }
                    cfg.publish_ms = Some(ms);
                }
                "--json-logs" => cfg.json_logs = true,
                "--log-dir" => cfg.log_dir = Some(PathBuf::from(take_value(args, &mut i)?)),
                "--metrics-addr" => cfg.metrics_addr = Some(take_value(args, &mut i)?.to_string()),
                "--audit-log" => cfg.audit_path = Some(PathBuf::from(take_value(args, &mut i)?)),
                "--opcua" => cfg.opcua_enabled = true,
                "--opcua-endpoint" => {
                    cfg.opcua_enabled = true;
                    cfg.opcua_endpoint = take_value(args, &mut i)?.to_string();
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                other => return Err(RuntimeError::UnknownArgument(other.to_string())),
            }
            i += 1;
        }
        Ok(cfg)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Publishers follow the tick cadence unless told otherwise.
    pub fn publish_interval(&self) -> Duration {
        Duration::from_millis(self.publish_ms.unwrap_or(self.tick_ms))
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        let period = self.tick_period();
        SchedulerConfig {
            tick_period: period,
            late_threshold: (period / 10).max(Duration::from_millis(1)),
            max_ticks: self.run_ticks,
        }
    }

    pub fn print_help() {
        println!(
            r#"mixer-sim - Mixing-tank process simulator (fill, mix, drain)

USAGE:
    mixer-sim [OPTIONS]

OPTIONS:
    --tick-ms <MS>          Simulation tick period [default: 1000]
    --run-seconds <SECS>    Run for a fixed duration then exit
    --run-ticks <N>         Stop after N ticks
    --equipment <N>         Mirrored equipment instances (Mixer100, Mixer200, ...) [default: 4]
    --seed <U64>            Seed the agitator speed noise (random otherwise)
    --pump1-speed <V>       Override Pump1.Speed.SP [default: 16.37]
    --pump2-speed <V>       Override Pump2.Speed.SP [default: 11.24]
    --agitator-speed <RPM>  Override Agitator.Speed.PV [default: 3000]
    --mixing-time <TICKS>   Override MixingTime.PV [default: 50]
    --bind <ADDR>           JSON-lines bridge bind address [default: 127.0.0.1:7100]
    --no-bridge             Disable the JSON-lines bridge
    --publish-ms <MS>       Bridge and OPC UA publish interval [default: tick period]
    --json-logs             Output logs in JSON format (for log aggregation)
    --log-dir <DIR>         Also write daily-rolling log files to DIR
    --metrics-addr <ADDR>   Enable Prometheus metrics server on address (e.g., 0.0.0.0:9090)
    --audit-log <PATH>      Enable audit logging to specified JSONL file
    --opcua                 Enable OPC UA server (requires 'opcua' feature)
    --opcua-endpoint <URL>  OPC UA endpoint URL [default: {DEFAULT_OPCUA_ENDPOINT}]
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log filter (e.g., RUST_LOG=debug,mixer_core=trace)

EXAMPLES:
    # One full fill/mix/drain cycle as fast as the clock allows
    mixer-sim --tick-ms 10 --run-ticks 166 --no-bridge

    # Production run with all observability
    mixer-sim --json-logs --metrics-addr 0.0.0.0:9090 --audit-log /var/log/mixer/audit.jsonl
"#
        );
    }
}

fn take_value<'a>(args: &'a [String], i: &mut usize) -> Result<&'a str, RuntimeError> {
    let flag = &args[*i];
    match args.get(*i + 1) {
        Some(value) => {
            *i += 1;
            Ok(value.as_str())
        }
        None => Err(RuntimeError::MissingValue { flag: flag.clone() }),
    }
}

fn parse_value<T: FromStr>(args: &[String], i: &mut usize) -> Result<T, RuntimeError> {
    let flag = args[*i].clone();
    let raw = take_value(args, i)?;
    raw.parse::<T>().map_err(|_| invalid(&flag, raw))
}

fn invalid(flag: &str, value: &str) -> RuntimeError {
    RuntimeError::InvalidArgument {
        flag: flag.to_string(),
        value: value.to_string(),
    }
}
