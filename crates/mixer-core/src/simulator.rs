use crate::noise::NoiseSource;
use crate::store::{TagSnapshot, TagStore};
use crate::tags::Tag;
use log::{debug, info};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Level at which supply switches from inlet 1 / pump 1 to inlet 2 / pump 2.
pub const LEVEL_SWITCHOVER: f64 = 600.0;
/// Full tank.
pub const LEVEL_MAX: f64 = 1000.0;
/// Level drop per draining tick.
pub const DRAIN_PER_TICK: f64 = 23.06;
/// Heating per mixing tick while the agitator runs.
pub const HEAT_PER_TICK: f64 = 14.6;
/// Heating only happens below this temperature.
pub const HEATING_CUTOFF: f64 = 301.0;
pub const TEMP_MAX: f64 = 300.0;
/// Cooling per draining tick.
pub const COOL_PER_TICK: f64 = 5.2;
/// Drained baseline temperature.
pub const TEMP_MIN: f64 = 71.816;
/// Half-width of the agitator speed noise band.
pub const AGITATOR_NOISE_RPM: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Filling,
    Mixing,
    Draining,
}

impl Phase {
    pub fn as_u8(self) -> u8 {
        match self {
            Phase::Filling => 0,
            Phase::Mixing => 1,
            Phase::Draining => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Filling => "filling",
            Phase::Mixing => "mixing",
            Phase::Draining => "draining",
        }
    }

    /// Phase that follows this one in the cycle.
    pub fn next(self) -> Phase {
        match self {
            Phase::Filling => Phase::Mixing,
            Phase::Mixing => Phase::Draining,
            Phase::Draining => Phase::Filling,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimStatus {
    pub phase: Phase,
    /// Ticks spent in the current mixing phase, `0..=MixingTime.PV`.
    pub mix_ticks: u32,
}

/// Outcome of one [`Simulator::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// 1-based number of the tick just executed.
    pub tick: u64,
    pub phase_before: Phase,
    pub phase_after: Phase,
}

impl TickReport {
    pub fn transitioned(&self) -> bool {
        self.phase_before != self.phase_after
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{tag} must be a finite positive number, got {value}")]
    InvalidSetpoint { tag: Tag, value: f64 },
    #[error("MixingTime.PV must be at least one tick")]
    ZeroMixingTime,
}

/// Start-up overrides for the setpoint tags. `None` keeps the catalog value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatorConfig {
    pub pump1_speed: Option<f64>,
    pub pump2_speed: Option<f64>,
    pub agitator_speed: Option<f64>,
    pub mixing_time: Option<u32>,
}

impl SimulatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let analog = [
            (Tag::Pump1SpeedSp, self.pump1_speed),
            (Tag::Pump2SpeedSp, self.pump2_speed),
            (Tag::AgitatorSpeedPv, self.agitator_speed),
        ];
        for (tag, value) in analog {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    return Err(ConfigError::InvalidSetpoint { tag, value });
                }
            }
        }
        if self.mixing_time == Some(0) {
            return Err(ConfigError::ZeroMixingTime);
        }
        Ok(())
    }

    fn apply(&self, tags: &mut TagStore) {
        if let Some(v) = self.pump1_speed {
            tags.set(Tag::Pump1SpeedSp, v);
        }
        if let Some(v) = self.pump2_speed {
            tags.set(Tag::Pump2SpeedSp, v);
        }
        if let Some(v) = self.agitator_speed {
            tags.set(Tag::AgitatorSpeedPv, v);
        }
        if let Some(v) = self.mixing_time {
            tags.set(Tag::MixingTimePv, f64::from(v));
        }
    }
}

/// Fill, mix, drain, repeat. One [`run`](Simulator::run) is one tick.
pub struct Simulator<N: NoiseSource> {
    tags: TagStore,
    status: SimStatus,
    noise: N,
    ticks: u64,
}

impl<N: NoiseSource> Simulator<N> {
    pub fn new(noise: N) -> Self {
        Self {
            tags: TagStore::initial(),
            status: SimStatus::default(),
            noise,
            ticks: 0,
        }
    }

    pub fn with_config(config: &SimulatorConfig, noise: N) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut sim = Self::new(noise);
        config.apply(&mut sim.tags);
        Ok(sim)
    }

    /// Executes one tick of the active phase.
    pub fn run(&mut self) -> TickReport {
        let phase_before = self.status.phase;
        match phase_before {
            Phase::Filling => self.fill_tank(),
            Phase::Mixing => self.mix_tank(),
            Phase::Draining => self.drain_tank(),
        }
        self.ticks += 1;

        let report = TickReport {
            tick: self.ticks,
            phase_before,
            phase_after: self.status.phase,
        };
        if report.transitioned() {
            info!(
                "tick {}: {} -> {} (level {:.2}, temperature {:.2})",
                report.tick,
                report.phase_before,
                report.phase_after,
                self.tags.get(Tag::LevelPv),
                self.tags.get(Tag::TemperaturePv)
            );
        }
        report
    }

    pub fn phase(&self) -> Phase {
        self.status.phase
    }

    pub fn status(&self) -> SimStatus {
        self.status
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn snapshot(&self) -> TagSnapshot {
        self.tags.snapshot()
    }

    /// Ticks executed since construction.
    pub fn tick_count(&self) -> u64 {
        self.ticks
    }

    #[cfg(test)]
    pub(crate) fn tags_mut(&mut self) -> &mut TagStore {
        &mut self.tags
    }

    fn fill_tank(&mut self) {
        let tags = &mut self.tags;

        let level = tags.get(Tag::LevelPv);
        if (0.0..LEVEL_SWITCHOVER).contains(&level)
            && tags.flag(Tag::Inlet1Cmd)
            && tags.flag(Tag::Pump1Cmd)
        {
            let speed = tags.get(Tag::Pump1SpeedSp);
            tags.set(Tag::Pump1Pv, speed);
            tags.set(Tag::LevelPv, (level + speed).min(LEVEL_MAX));
        }

        if tags.get(Tag::LevelPv) > LEVEL_SWITCHOVER {
            tags.set_flag(Tag::Inlet1Cmd, false);
            tags.set_flag(Tag::Pump1Cmd, false);
            tags.set(Tag::Pump1Pv, 0.0);
            tags.set_flag(Tag::Inlet2Cmd, true);
            tags.set_flag(Tag::Pump2Cmd, true);
        }

        let level = tags.get(Tag::LevelPv);
        if (LEVEL_SWITCHOVER..LEVEL_MAX).contains(&level)
            && tags.flag(Tag::Inlet2Cmd)
            && tags.flag(Tag::Pump2Cmd)
        {
            let speed = tags.get(Tag::Pump2SpeedSp);
            tags.set(Tag::Pump2Pv, speed);
            tags.set(Tag::LevelPv, (level + speed).min(LEVEL_MAX));
        }

        if tags.get(Tag::LevelPv) >= LEVEL_MAX {
            tags.set_flag(Tag::Inlet2Cmd, false);
            tags.set_flag(Tag::Pump2Cmd, false);
            tags.set(Tag::Pump2Pv, 0.0);
            tags.set_flag(Tag::AgitatorCmd, true);
            self.status.phase = Phase::Mixing;
            self.status.mix_ticks = 0;
        }

        // Inlet feedback is only refreshed here, so it stays frozen while mixing and draining.
        refresh_inlet_feedback(
            tags,
            Tag::Inlet1Cmd,
            Tag::Inlet1Position,
            Tag::Inlet1Ols,
            Tag::Inlet1Cls,
        );
        refresh_inlet_feedback(
            tags,
            Tag::Inlet2Cmd,
            Tag::Inlet2Position,
            Tag::Inlet2Ols,
            Tag::Inlet2Cls,
        );
    }

    fn mix_tank(&mut self) {
        let tags = &mut self.tags;

        if tags.flag(Tag::AgitatorCmd) {
            let speed = tags.get(Tag::AgitatorSpeedPv);
            let measured = self
                .noise
                .uniform(speed - AGITATOR_NOISE_RPM, speed + AGITATOR_NOISE_RPM);
            tags.set(Tag::AgitatorPv, measured);

            let temperature = tags.get(Tag::TemperaturePv);
            if temperature < HEATING_CUTOFF {
                tags.set(Tag::TemperaturePv, (temperature + HEAT_PER_TICK).min(TEMP_MAX));
            }
        }

        self.status.mix_ticks += 1;
        debug!("mixing tick {}", self.status.mix_ticks);

        if f64::from(self.status.mix_ticks) >= tags.get(Tag::MixingTimePv) {
            self.status.mix_ticks = 0;
            self.status.phase = Phase::Draining;
            tags.set_flag(Tag::AgitatorCmd, false);
            tags.set(Tag::AgitatorPv, 0.0);
            tags.set_flag(Tag::OutletCmd, true);
        }
    }

    fn drain_tank(&mut self) {
        let tags = &mut self.tags;

        let level = tags.get(Tag::LevelPv);
        if level > 0.0 && tags.flag(Tag::OutletCmd) {
            tags.set(Tag::LevelPv, (level - DRAIN_PER_TICK).max(0.0));
            let temperature = tags.get(Tag::TemperaturePv);
            if temperature > TEMP_MIN {
                tags.set(Tag::TemperaturePv, (temperature - COOL_PER_TICK).max(TEMP_MIN));
            }
        }

        if tags.get(Tag::LevelPv) == 0.0 {
            tags.set_flag(Tag::OutletCmd, false);
            self.status.phase = Phase::Filling;
            tags.set_flag(Tag::Inlet1Cmd, true);
            tags.set_flag(Tag::Pump1Cmd, true);
        }

        tags.set(Tag::OutletPosition, tags.get(Tag::OutletCmd));
    }
}

fn refresh_inlet_feedback(tags: &mut TagStore, cmd: Tag, position: Tag, ols: Tag, cls: Tag) {
    let open = tags.flag(cmd);
    tags.set_flag(position, open);
    tags.set_flag(ols, open);
    tags.set_flag(cls, !open);
}
