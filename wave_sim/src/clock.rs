//! Frame advancement and time bookkeeping

use crate::classical::{ClassicalEngine, ClassicalParticle};
use crate::config::SimConfig;
use crate::potential::PotentialField;
use crate::wave::WaveEngine;
use crate::wavefunction::WaveFunction;

/// Result of one [`SimulationClock::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdvanceOutcome {
    /// Sub-steps actually taken; zero once time has run out.
    pub steps: usize,
    pub elapsed: f64,
    pub remaining: f64,
}

impl AdvanceOutcome {
    pub fn finished(&self) -> bool {
        self.remaining <= 0.0
    }
}

/// Everything a frame reads or writes, borrowed for the duration of one call.
pub struct FrameState<'a> {
    pub wave_engine: &'a WaveEngine,
    pub classical_engine: &'a ClassicalEngine,
    pub potential: &'a PotentialField,
    pub wave: &'a mut WaveFunction,
    pub particle: &'a mut ClassicalParticle,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationClock {
    time_step: f64,
    time_limit: f64,
    elapsed: f64,
}

impl SimulationClock {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            time_step: config.time_step,
            time_limit: config.time_limit,
            elapsed: 0.0,
        }
    }

    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn remaining(&self) -> f64 {
        self.time_limit - self.elapsed
    }

    pub fn time_limit(&self) -> f64 {
        self.time_limit
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() <= 0.0
    }

    pub fn is_at_start(&self) -> bool {
        self.elapsed == 0.0
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }

    /// Jump to a fraction of the time limit.
    pub fn set_fraction(&mut self, fraction: f64) {
        self.elapsed = fraction * self.time_limit;
    }

    /// Take `sub_steps` wave steps and the same span of classical motion.
    ///
    /// The two integrators run concurrently and both finish before this
    /// returns. Nothing happens once the time limit has been reached.
    pub fn advance(&mut self, sub_steps: usize, frame: FrameState<'_>) -> AdvanceOutcome {
        if self.is_finished() || sub_steps == 0 {
            return self.outcome(0);
        }

        let FrameState {
            wave_engine,
            classical_engine,
            potential,
            wave,
            particle,
        } = frame;
        let dt = self.time_step;
        let values = potential.values();

        rayon::join(
            || {
                for _ in 0..sub_steps {
                    wave_engine.step(wave, values);
                }
            },
            || {
                let smooth = |x: f64, y: f64| potential.value_at(x, y, false);
                for _ in 0..sub_steps {
                    classical_engine.advance(particle, smooth, dt);
                }
            },
        );

        self.elapsed += sub_steps as f64 * dt;
        if self.is_finished() {
            log::info!("time limit of {} reached", self.time_limit);
        }
        self.outcome(sub_steps)
    }

    fn outcome(&self, steps: usize) -> AdvanceOutcome {
        AdvanceOutcome {
            steps,
            elapsed: self.elapsed,
            remaining: self.remaining(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wavefunction::Packet;
    use glam::DVec2;

    #[test]
    fn advance_tracks_time_and_stops_at_limit() {
        let config = SimConfig {
            samples_per_side: 21,
            time_limit: 0.005,
            ..SimConfig::default()
        };
        let wave_engine = WaveEngine::new(&config);
        let classical_engine = ClassicalEngine::new(&config);
        let potential = PotentialField::new(&config);
        let mut wave = WaveFunction::from_packet(potential.geometry(), &Packet::default());
        let mut particle = ClassicalParticle::new(DVec2::ZERO, DVec2::new(1.0, 0.0));
        let mut clock = SimulationClock::new(&config);

        let frame = |clock: &mut SimulationClock,
                     wave: &mut WaveFunction,
                     particle: &mut ClassicalParticle| {
            clock.advance(
                3,
                FrameState {
                    wave_engine: &wave_engine,
                    classical_engine: &classical_engine,
                    potential: &potential,
                    wave,
                    particle,
                },
            )
        };

        let first = frame(&mut clock, &mut wave, &mut particle);
        assert_eq!(first.steps, 3);
        assert!((first.elapsed - 0.003).abs() < 1e-12);
        assert!((particle.position.x - 0.003).abs() < 1e-9);

        let second = frame(&mut clock, &mut wave, &mut particle);
        assert!(second.finished());

        let third = frame(&mut clock, &mut wave, &mut particle);
        assert_eq!(third.steps, 0);
        assert_eq!(third.elapsed, second.elapsed);
    }
}
