//! Prometheus metrics for the mixing-tank simulator.
//!
//! Tick counters are fed from the scheduler thread through [`record_tick`];
//! process gauges are refreshed from published snapshots through
//! [`record_snapshot`].

use mixer_core::{Phase, ProcessSnapshot, TickReport};
use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts,
    Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tiny_http::{Response, Server};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("failed to start metrics server on {addr}: {reason}")]
    Bind { addr: String, reason: String },
}

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Scheduler Metrics
// ============================================================================

/// Total simulation ticks executed
pub static TICKS_EXECUTED: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new("mixer_ticks_executed_total", "Total simulation ticks executed")
        .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Ticks that started later than the late threshold
pub static TICKS_LATE: LazyLock<IntCounter> = LazyLock::new(|| {
    let counter = IntCounter::new(
        "mixer_ticks_late_total",
        "Simulation ticks started later than the late threshold",
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Tick start lateness in microseconds
pub static TICK_LATENESS_US: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "mixer_tick_lateness_us",
            "Tick start lateness distribution in microseconds",
        )
        .buckets(vec![
            10.0, 100.0, 500.0, 1_000.0, 5_000.0, 10_000.0, 50_000.0, 100_000.0, 500_000.0,
        ]),
    )
    .unwrap();
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

// ============================================================================
// Process Metrics
// ============================================================================

/// Current phase (0=filling,1=mixing,2=draining)
pub static PHASE: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "mixer_phase",
        "Current process phase (0=filling,1=mixing,2=draining)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Phase transitions by target phase
pub static PHASE_TRANSITIONS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    let counter = IntCounterVec::new(
        Opts::new("mixer_phase_transitions_total", "Phase transitions by target phase"),
        &["to"],
    )
    .unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
});

/// Latest value of every tag
pub static TAG_VALUE: LazyLock<GaugeVec> = LazyLock::new(|| {
    let gauge = GaugeVec::new(
        Opts::new("mixer_tag_value", "Latest published value of each process tag"),
        &["tag"],
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

// ============================================================================
// Publisher Metrics
// ============================================================================

/// Bridge client connection status (1 = connected, 0 = disconnected)
pub static BRIDGE_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    let gauge = Gauge::new(
        "mixer_bridge_connected",
        "Bridge client connection status (1=connected, 0=disconnected)",
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

/// Account for one executed tick.
pub fn record_tick(report: &TickReport, lateness: Duration, late: bool) {
    TICKS_EXECUTED.inc();
    TICK_LATENESS_US.observe(lateness.as_micros() as f64);
    if late {
        TICKS_LATE.inc();
    }
    if report.transitioned() {
        PHASE_TRANSITIONS
            .with_label_values(&[report.phase_after.as_str()])
            .inc();
    }
}

/// Copy a published snapshot into the process gauges.
pub fn record_snapshot(snapshot: &ProcessSnapshot) {
    PHASE.set(f64::from(snapshot.phase.as_u8()));
    for (name, value) in snapshot.tags.iter() {
        TAG_VALUE.with_label_values(&[name]).set(value);
    }
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Bind the metrics HTTP server on `bind_addr` and serve it from a background
/// thread. Bind failures are returned to the caller.
pub fn serve_metrics(bind_addr: &str) -> Result<thread::JoinHandle<()>, MetricsError> {
    let server = Server::http(bind_addr).map_err(|e| MetricsError::Bind {
        addr: bind_addr.to_string(),
        reason: e.to_string(),
    })?;
    tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

    Ok(thread::spawn(move || {
        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let metric_families = REGISTRY.gather();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the first tick has been executed
                    if TICKS_EXECUTED.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    }))
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = TICKS_EXECUTED.get();
    let _ = TICKS_LATE.get();
    let _ = TICK_LATENESS_US.get_sample_count();
    let _ = PHASE.get();
    let _ = BRIDGE_CONNECTED.get();
    for phase in [Phase::Filling, Phase::Mixing, Phase::Draining] {
        let _ = PHASE_TRANSITIONS.with_label_values(&[phase.as_str()]).get();
    }
    let _ = LazyLock::force(&TAG_VALUE);
}
