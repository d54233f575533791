use mixer_core::StateExchange;
use mixer_io::metrics::{init_metrics, record_snapshot, serve_metrics, MetricsError};
use mixer_io::run_publisher;
use std::sync::{atomic::AtomicBool, Arc};
use std::thread;
use std::time::Duration;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(
    addr: Option<&str>,
) -> Result<Option<thread::JoinHandle<()>>, MetricsError> {
    addr.map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr)
    })
    .transpose()
}

/// Copies every new snapshot into the process gauges until `stop` is raised.
pub fn start_metrics_updater(
    exchange: Arc<StateExchange>,
    stop: Arc<AtomicBool>,
    interval: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        run_publisher(&exchange, &stop, interval, &mut record_snapshot);
    })
}
