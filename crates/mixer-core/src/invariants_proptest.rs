#[cfg(test)]
mod proptest_invariants {
    use crate::noise::RngNoise;
    use crate::simulator::*;
    use crate::tags::Tag;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        // Property: level and temperature stay inside their bands on every tick
        #[test]
        fn level_and_temperature_stay_bounded(
            pump1 in 1.0f64..=120.0,
            pump2 in 1.0f64..=120.0,
            agitator in 100.0f64..=5000.0,
            mixing_time in 1u32..=80,
            seed in any::<u64>(),
            ticks in 1usize..=1500,
        ) {
            let config = SimulatorConfig {
                pump1_speed: Some(pump1),
                pump2_speed: Some(pump2),
                agitator_speed: Some(agitator),
                mixing_time: Some(mixing_time),
            };
            let mut sim = Simulator::with_config(&config, RngNoise::seeded(seed)).unwrap();
            for _ in 0..ticks {
                sim.run();
                let level = sim.tags().get(Tag::LevelPv);
                let temp = sim.tags().get(Tag::TemperaturePv);
                prop_assert!((0.0..=LEVEL_MAX).contains(&level), "level {}", level);
                prop_assert!((TEMP_MIN..=TEMP_MAX).contains(&temp), "temperature {}", temp);
                prop_assert!(f64::from(sim.status().mix_ticks) <= f64::from(mixing_time));
            }
        }

        // Property: phases only ever advance to their successor
        #[test]
        fn phases_advance_cyclically(
            pump1 in 5.0f64..=60.0,
            pump2 in 5.0f64..=60.0,
            mixing_time in 1u32..=60,
            ticks in 1usize..=1500,
        ) {
            let config = SimulatorConfig {
                pump1_speed: Some(pump1),
                pump2_speed: Some(pump2),
                mixing_time: Some(mixing_time),
                ..Default::default()
            };
            let mut sim = Simulator::with_config(&config, RngNoise::seeded(0)).unwrap();
            for _ in 0..ticks {
                let report = sim.run();
                if report.transitioned() {
                    prop_assert_eq!(report.phase_after, report.phase_before.next());
                }
            }
        }

        // Property: inlet limit switches are complementary and follow the
        // command as of the last filling tick
        #[test]
        fn inlet_limit_switches_exclusive(
            seed in any::<u64>(),
            ticks in 1usize..=800,
        ) {
            let mut sim = Simulator::new(RngNoise::seeded(seed));
            for _ in 0..ticks {
                let report = sim.run();
                let tags = sim.tags();
                for (ols, cls, pos, cmd) in [
                    (Tag::Inlet1Ols, Tag::Inlet1Cls, Tag::Inlet1Position, Tag::Inlet1Cmd),
                    (Tag::Inlet2Ols, Tag::Inlet2Cls, Tag::Inlet2Position, Tag::Inlet2Cmd),
                ] {
                    prop_assert_eq!(tags.get(ols) + tags.get(cls), 1.0);
                    prop_assert_eq!(tags.get(ols), tags.get(pos));
                    if report.phase_before == Phase::Filling {
                        prop_assert_eq!(tags.get(pos), tags.get(cmd));
                    }
                }
            }
        }

        // Property: agitator speed noise stays within +/-100 rpm of the setpoint
        #[test]
        fn agitator_noise_bounded(
            agitator in 100.0f64..=5000.0,
            seed in any::<u64>(),
        ) {
            let config = SimulatorConfig {
                agitator_speed: Some(agitator),
                ..Default::default()
            };
            let mut sim = Simulator::with_config(&config, RngNoise::seeded(seed)).unwrap();
            for _ in 0..166 {
                let report = sim.run();
                let pv = sim.tags().get(Tag::AgitatorPv);
                if report.phase_before == Phase::Mixing && report.phase_after == Phase::Mixing {
                    prop_assert!(
                        pv >= agitator - AGITATOR_NOISE_RPM && pv <= agitator + AGITATOR_NOISE_RPM,
                        "agitator {} outside band around {}", pv, agitator
                    );
                } else {
                    prop_assert_eq!(pv, 0.0);
                }
            }
        }
    }
}
