//! Preset scenarios

use glam::DVec2;

use crate::config::SimConfig;
use crate::error::SimError;
use crate::simulation::Simulation;
use crate::source::Barrier;
use crate::wavefunction::Packet;

/// Preset simulation scenarios
impl Simulation {
    /// Thin wall left of center with a fast packet heading straight at it
    pub fn preset_tutorial_wall(config: SimConfig) -> Result<Self, SimError> {
        let side = config.side_length;
        let packet = Packet::new(DVec2::new(0.2 * side / 2.0, 0.0), 180.0, config.max_speed.min(6.5), 1.0);
        let mut sim = Self::with_packet(config, packet)?;
        sim.set_source(Box::new(Barrier::Wall {
            height: 22.0,
            x_min: -side / 6.0,
            x_max: -side / 6.0 + side / 40.0,
        }))?;
        sim.reset();
        Ok(sim)
    }

    /// Flat potential, packet drifting diagonally
    pub fn preset_free_packet(config: SimConfig) -> Result<Self, SimError> {
        let packet = Packet::new(DVec2::new(-2.0, -2.0), 45.0, 3.0, 1.0);
        Self::with_packet(config, packet)
    }

    /// Packet scattering off a smooth hill
    pub fn preset_gaussian_hill(config: SimConfig) -> Result<Self, SimError> {
        let side = config.side_length;
        let packet = Packet::new(DVec2::new(-0.3 * side, 0.3), 0.0, 5.0, 1.0);
        let mut sim = Self::with_packet(config, packet)?;
        sim.set_source(Box::new(Barrier::Gaussian {
            height: 12.0,
            center: DVec2::ZERO,
            sigma: 0.8,
        }))?;
        sim.reset();
        Ok(sim)
    }
}
