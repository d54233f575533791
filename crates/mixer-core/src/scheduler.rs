use crate::clock::{TickSource, TimeBase};
use crate::noise::NoiseSource;
use crate::simulator::{Simulator, TickReport};
use crate::sync::{ProcessSnapshot, StateExchange};
use log::warn;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    pub tick_period: Duration,
    /// Wake-ups later than this are counted as late ticks.
    pub late_threshold: Duration,
    /// Stop on its own after this many ticks.
    pub max_ticks: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_period: Duration::from_secs(1),
            late_threshold: Duration::from_millis(100),
            max_ticks: None,
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct ExecutionStats {
    pub ticks_executed: u64,
    pub ticks_late: u64,
    pub max_lateness_us: u64,
    pub phase_transitions: u64,
}

/// Called on the scheduler thread after each tick has been published.
pub trait TickObserver: Send {
    fn on_tick(&mut self, report: &TickReport, snapshot: &ProcessSnapshot, lateness: Duration);
}

impl<F> TickObserver for F
where
    F: FnMut(&TickReport, &ProcessSnapshot, Duration) + Send,
{
    fn on_tick(&mut self, report: &TickReport, snapshot: &ProcessSnapshot, lateness: Duration) {
        self(report, snapshot, lateness)
    }
}

/// Drives the simulator: wait for the tick, run it, publish the snapshot.
pub struct Scheduler<N: NoiseSource, T: TickSource> {
    simulator: Simulator<N>,
    clock: T,
    config: SchedulerConfig,
    exchange: Arc<StateExchange>,
    timebase: TimeBase,
    stats: ExecutionStats,
    observers: Vec<Box<dyn TickObserver>>,
}

impl<N: NoiseSource, T: TickSource> Scheduler<N, T> {
    pub fn new(
        simulator: Simulator<N>,
        clock: T,
        config: SchedulerConfig,
        exchange: Arc<StateExchange>,
        timebase: TimeBase,
    ) -> Self {
        Self {
            simulator,
            clock,
            config,
            exchange,
            timebase,
            stats: ExecutionStats::default(),
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: impl TickObserver + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Waits for the next tick, executes it and publishes the result.
    pub fn step(&mut self) -> TickReport {
        let lateness = self.clock.wait_next();

        let report = self.simulator.run();
        let status = self.simulator.status();
        let snapshot = ProcessSnapshot {
            tick: report.tick,
            timestamp_us: self.timebase.now_us(),
            unix_us: self.timebase.unix_us(),
            phase: status.phase,
            mix_ticks: status.mix_ticks,
            tags: self.simulator.snapshot(),
        };
        self.exchange.publish_state(snapshot);

        self.stats.ticks_executed += 1;
        if report.transitioned() {
            self.stats.phase_transitions += 1;
        }
        let lateness_us = lateness.as_micros() as u64;
        self.stats.max_lateness_us = self.stats.max_lateness_us.max(lateness_us);
        if lateness > self.config.late_threshold {
            self.stats.ticks_late += 1;
            warn!("tick {} started {} us late", report.tick, lateness_us);
        }

        for observer in &mut self.observers {
            observer.on_tick(&report, &snapshot, lateness);
        }
        report
    }

    pub fn run_ticks(&mut self, count: u64) {
        for _ in 0..count {
            self.step();
        }
    }

    /// Ticks until `stop` is raised or `max_ticks` is reached. The flag is only
    /// checked between ticks.
    pub fn run(&mut self, stop: &AtomicBool) {
        while !stop.load(Ordering::Relaxed) {
            if let Some(max) = self.config.max_ticks {
                if self.stats.ticks_executed >= max {
                    break;
                }
            }
            self.step();
        }
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub fn simulator(&self) -> &Simulator<N> {
        &self.simulator
    }
}
