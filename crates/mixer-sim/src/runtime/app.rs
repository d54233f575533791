use crate::infra::audit::{AuditEventType, AuditLogger, ClientDetails, PhaseTransitionDetails};
#[cfg(feature = "opcua")]
use crate::integrations::opcua_server::{run_opcua, OpcuaConfig};
use crate::runtime::config::RuntimeConfig;
use crate::runtime::error::RuntimeError;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use mixer_core::{
    FixedRateClock, NoiseSource, ProcessSnapshot, RngNoise, Scheduler, Simulator, StateExchange,
    Tag, TickReport, TimeBase,
};
use mixer_io::{record_tick, Bridge, BridgeConfig, BridgeEvent, EquipmentSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub fn run_from_args() -> Result<(), RuntimeError> {
    let config = RuntimeConfig::from_env()?;
    if config.show_help {
        RuntimeConfig::print_help();
        return Ok(());
    }
    run(config)
}

pub fn run(config: RuntimeConfig) -> Result<(), RuntimeError> {
    let _log_guard = init_tracing(config.json_logs, config.log_dir.as_deref())?;

    telemetry::init();
    let metrics_enabled = config.metrics_addr.is_some();
    let _metrics_handle = telemetry::start_metrics_server(config.metrics_addr.as_deref())?;

    #[cfg(not(feature = "opcua"))]
    if config.opcua_enabled {
        return Err(RuntimeError::OpcuaUnavailable {
            endpoint: config.opcua_endpoint.clone(),
        });
    }

    let exchange = Arc::new(StateExchange::new());
    let timebase = TimeBase::new();
    let equipment = EquipmentSet::new(config.equipment);
    let audit_logger = init_audit_logger(config.audit_path.as_deref())?;

    let noise: Box<dyn NoiseSource> = match config.seed {
        Some(seed) => Box::new(RngNoise::seeded(seed)),
        None => Box::new(RngNoise::from_entropy()),
    };
    let simulator = Simulator::with_config(&config.setpoints, noise)?;

    // Bind publishers before the first tick so address errors abort startup.
    let bridge = if config.bridge_enabled {
        Some(Bridge::bind(BridgeConfig {
            bind_addr: config.bind_addr.clone(),
            publish_interval: config.publish_interval(),
            equipment: equipment.clone(),
        })?)
    } else {
        info!("Bridge disabled");
        None
    };

    // Ctrl-C only stops the scheduler; teardown below then runs as for a
    // bounded run.
    let scheduler_stop = Arc::new(AtomicBool::new(false));
    {
        let stop = Arc::clone(&scheduler_stop);
        ctrlc::set_handler(move || {
            info!("Interrupt received, stopping scheduler");
            stop.store(true, Ordering::Relaxed);
        })?;
    }

    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(
            timebase.now_us(),
            timebase.unix_us(),
            AuditEventType::SystemStart,
            serde_json::json!({
                "version": env!("CARGO_PKG_VERSION"),
                "tick_ms": config.tick_ms,
                "equipment": equipment.names(),
                "seed": config.seed,
                "bridge_enabled": config.bridge_enabled,
                "metrics_enabled": metrics_enabled,
                "opcua_enabled": config.opcua_enabled,
            }),
        );
    }

    let scheduler_config = config.scheduler_config();
    let late_threshold = scheduler_config.late_threshold;
    let mut scheduler = Scheduler::new(
        simulator,
        FixedRateClock::new(config.tick_period()),
        scheduler_config,
        Arc::clone(&exchange),
        timebase,
    );
    scheduler.add_observer(
        move |report: &TickReport, _: &ProcessSnapshot, lateness: Duration| {
            record_tick(report, lateness, lateness > late_threshold);
        },
    );
    if let Some(logger) = audit_logger.clone() {
        scheduler.add_observer(
            move |report: &TickReport, snapshot: &ProcessSnapshot, _: Duration| {
                if !report.transitioned() {
                    return;
                }
                let details = PhaseTransitionDetails {
                    tick: report.tick,
                    from: report.phase_before,
                    to: report.phase_after,
                    level: snapshot.tags.get(Tag::LevelPv),
                    temperature: snapshot.tags.get(Tag::TemperaturePv),
                };
                if let Err(e) = logger.log_event(
                    snapshot.timestamp_us,
                    snapshot.unix_us,
                    AuditEventType::PhaseTransition,
                    details,
                ) {
                    warn!(error = %e, "Failed to write audit entry");
                }
            },
        );
    }

    // Scheduler and publishers stop separately: the scheduler is joined first
    // so publishers always see the final tick.
    let publisher_stop = Arc::new(AtomicBool::new(false));

    info!(
        tick_ms = config.tick_ms,
        equipment = equipment.len(),
        max_ticks = ?config.run_ticks,
        "Starting scheduler"
    );
    let scheduler_handle = {
        let stop = Arc::clone(&scheduler_stop);
        thread::spawn(move || {
            scheduler.run(&stop);
            scheduler.stats().clone()
        })
    };

    let bridge_handle = bridge.map(|bridge| {
        let exchange = Arc::clone(&exchange);
        let stop = Arc::clone(&publisher_stop);
        let logger = audit_logger.clone();
        thread::spawn(move || {
            bridge.run(exchange, stop, |event| {
                if let Some(ref logger) = logger {
                    log_client_event(logger, &timebase, event);
                }
            });
        })
    });

    let updater_handle = metrics_enabled.then(|| {
        telemetry::start_metrics_updater(
            Arc::clone(&exchange),
            Arc::clone(&publisher_stop),
            config.publish_interval(),
        )
    });

    #[cfg(feature = "opcua")]
    let opcua_handle = if config.opcua_enabled {
        let opcua_config = OpcuaConfig {
            endpoint: config.opcua_endpoint.clone(),
            update_interval: config.publish_interval(),
            equipment: equipment.clone(),
            ..Default::default()
        };
        info!(endpoint = %opcua_config.endpoint, "Starting OPC UA server");
        Some(run_opcua(
            Arc::clone(&exchange),
            Arc::clone(&publisher_stop),
            opcua_config,
        )?)
    } else {
        None
    };

    info!("mixer-sim running");

    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        let deadline = Instant::now() + Duration::from_secs(seconds);
        while Instant::now() < deadline && !scheduler_handle.is_finished() {
            thread::sleep(Duration::from_millis(20));
        }
        scheduler_stop.store(true, Ordering::Relaxed);
    }

    let stats = scheduler_handle
        .join()
        .map_err(|_| RuntimeError::SchedulerPanicked)?;

    // Give publishers one interval to pick up the final tick.
    thread::sleep(config.publish_interval().min(Duration::from_millis(500)));
    publisher_stop.store(true, Ordering::Relaxed);
    if let Some(handle) = bridge_handle {
        let _ = handle.join();
    }
    if let Some(handle) = updater_handle {
        let _ = handle.join();
    }
    #[cfg(feature = "opcua")]
    if let Some(handle) = opcua_handle {
        let _ = handle.join();
    }

    let final_state = exchange.read_state();
    info!(
        ticks_executed = stats.ticks_executed,
        ticks_late = stats.ticks_late,
        max_lateness_us = stats.max_lateness_us,
        phase_transitions = stats.phase_transitions,
        final_phase = %final_state.phase,
        "Run complete"
    );

    if let Some(ref logger) = audit_logger {
        let _ = logger.log_event(
            timebase.now_us(),
            timebase.unix_us(),
            AuditEventType::SystemShutdown,
            serde_json::json!({
                "ticks_executed": stats.ticks_executed,
                "ticks_late": stats.ticks_late,
                "phase_transitions": stats.phase_transitions,
                "final_phase": final_state.phase,
            }),
        );
    }

    Ok(())
}

fn log_client_event(logger: &AuditLogger, timebase: &TimeBase, event: BridgeEvent) {
    let (event_type, addr) = match event {
        BridgeEvent::ClientConnected { addr } => (AuditEventType::ClientConnected, addr),
        BridgeEvent::ClientDisconnected { addr } => (AuditEventType::ClientDisconnected, addr),
    };
    let details = ClientDetails {
        client_addr: addr.to_string(),
    };
    if let Err(e) = logger.log_event(timebase.now_us(), timebase.unix_us(), event_type, details) {
        warn!(error = %e, "Failed to write audit entry");
    }
}

fn init_audit_logger(audit_path: Option<&Path>) -> Result<Option<Arc<AuditLogger>>, RuntimeError> {
    audit_path
        .map(|path| match AuditLogger::new(path) {
            Ok(logger) => {
                info!(path = %path.display(), "Audit logging enabled");
                Ok(Arc::new(logger))
            }
            Err(source) => Err(RuntimeError::Audit {
                path: path.to_path_buf(),
                source,
            }),
        })
        .transpose()
}
