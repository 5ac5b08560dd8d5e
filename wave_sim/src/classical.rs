//! Classical point particle moving under `-∇V`

use glam::DVec2;

use crate::config::SimConfig;

/// Gradient probe distance as a fraction of the grid spacing.
pub const GRADIENT_STEP_FACTOR: f64 = 0.51;

/// Composition applied for each classical micro-step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassicalScheme {
    /// Half kick, drift, half kick
    Verlet,
    /// Three Verlet steps weighted `θ, 1-2θ, θ` with `θ = 1/(2-2^(1/3))`
    #[default]
    ForestRuth,
}

impl ClassicalScheme {
    /// Sub-step weights that sum to one.
    pub fn weights(&self) -> Vec<f64> {
        match self {
            ClassicalScheme::Verlet => vec![1.0],
            ClassicalScheme::ForestRuth => {
                let theta = 1.0 / (2.0 - 2f64.powf(1.0 / 3.0));
                vec![theta, 1.0 - 2.0 * theta, theta]
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ClassicalParticle {
    pub position: DVec2,
    pub velocity: DVec2,
}

impl ClassicalParticle {
    pub fn new(position: DVec2, velocity: DVec2) -> Self {
        Self { position, velocity }
    }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * self.velocity.length_squared()
    }
}

/// Integrates a [`ClassicalParticle`] against a smooth potential lookup.
#[derive(Debug, Clone)]
pub struct ClassicalEngine {
    gradient_step: f64,
    micro_steps: usize,
    scheme: ClassicalScheme,
}

impl ClassicalEngine {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            gradient_step: GRADIENT_STEP_FACTOR * config.spacing(),
            micro_steps: config.classical_micro_steps.max(1),
            scheme: config.classical_scheme,
        }
    }

    /// Central-difference gradient of `potential` at `point`.
    pub fn gradient<F>(&self, potential: &F, point: DVec2) -> DVec2
    where
        F: Fn(f64, f64) -> f64,
    {
        let h = self.gradient_step;
        let dx = potential(point.x + h, point.y) - potential(point.x - h, point.y);
        let dy = potential(point.x, point.y + h) - potential(point.x, point.y - h);
        DVec2::new(dx, dy) / (2.0 * h)
    }

    /// Advance by `dt`, split into the configured number of micro-steps.
    pub fn advance<F>(&self, particle: &mut ClassicalParticle, potential: F, dt: f64)
    where
        F: Fn(f64, f64) -> f64,
    {
        let micro = dt / self.micro_steps as f64;
        let weights = self.scheme.weights();
        for _ in 0..self.micro_steps {
            for &weight in &weights {
                self.verlet(particle, &potential, weight * micro);
            }
        }
    }

    /// Velocity-Verlet: half kick, drift, half kick.
    pub fn verlet<F>(&self, particle: &mut ClassicalParticle, potential: &F, dt: f64)
    where
        F: Fn(f64, f64) -> f64,
    {
        let accel = -self.gradient(potential, particle.position);
        particle.velocity += accel * (dt / 2.0);
        particle.position += particle.velocity * dt;
        let accel = -self.gradient(potential, particle.position);
        particle.velocity += accel * (dt / 2.0);
    }
}
