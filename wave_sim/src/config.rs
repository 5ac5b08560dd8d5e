//! Engine configuration and validation.
//!
//! Every engine constructor takes a validated [`SimConfig`], so two
//! simulations with different grids can coexist in one process.

use std::error::Error;
use std::fmt;

use crate::classical::ClassicalScheme;
use crate::wave::{Integrator, Stencil};

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected during [`SimConfig::validate()`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Side length is NaN, infinite, zero, or negative.
    InvalidSideLength {
        /// The invalid value.
        value: f64,
    },
    /// Fewer samples per side than the widest stencil needs.
    GridTooSmall {
        /// The configured side count.
        samples_per_side: usize,
        /// Minimum accepted side count.
        minimum: usize,
    },
    /// Time step is NaN, infinite, zero, or negative.
    InvalidTimeStep {
        /// The invalid value.
        value: f64,
    },
    /// `max_potential` is not a finite positive number.
    InvalidMaxPotential {
        /// The invalid value.
        value: f64,
    },
    /// `time_limit` is not a finite positive number.
    InvalidTimeLimit {
        /// The invalid value.
        value: f64,
    },
    /// At least one row band is required.
    ZeroBands,
    /// The classical integrator needs at least one micro-step per sub-step.
    ZeroMicroSteps,
    /// Tile placement spacing must be at least one cell.
    ZeroPlacementSpacing,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSideLength { value } => {
                write!(f, "side_length must be finite and positive, got {value}")
            }
            Self::GridTooSmall {
                samples_per_side,
                minimum,
            } => write!(
                f,
                "samples_per_side {samples_per_side} is below minimum of {minimum}"
            ),
            Self::InvalidTimeStep { value } => {
                write!(f, "time_step must be finite and positive, got {value}")
            }
            Self::InvalidMaxPotential { value } => {
                write!(f, "max_potential must be finite and positive, got {value}")
            }
            Self::InvalidTimeLimit { value } => {
                write!(f, "time_limit must be finite and positive, got {value}")
            }
            Self::ZeroBands => write!(f, "bands must be at least 1"),
            Self::ZeroMicroSteps => write!(f, "classical_micro_steps must be at least 1"),
            Self::ZeroPlacementSpacing => write!(f, "placement_spacing must be at least 1"),
        }
    }
}

impl Error for ConfigError {}

// ── SimConfig ──────────────────────────────────────────────────────

/// Immutable parameters shared by every engine component.
///
/// # Stability
///
/// The explicit scheme is only stable while `time_step` scales with `dR²`:
/// shrinking the grid spacing `dR` by a factor `k` (roughly `k` times more
/// samples per side) needs a time step `k²` times smaller. [`validate()`](Self::validate) does
/// not check this; pick the pair deliberately. The defaults (199 samples per
/// side, `dt = 0.001`) are a known-good pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// World-space width of the square simulation region.
    pub side_length: f64,
    /// Grid samples along each side. Odd counts keep Simpson-style
    /// quadrature available to hosts; the engine itself does not require it.
    pub samples_per_side: usize,
    /// Integrator time step per sub-step.
    pub time_step: f64,
    /// Potentials are clamped to `[-max_potential, max_potential]`.
    ///
    /// Ray picking sweeps every integer level in that range, so its cost
    /// grows linearly with this value.
    pub max_potential: f64,
    /// Value reported by point queries on or beyond the square's edge.
    pub boundary_potential: f64,
    /// Simulated time allotted to one run.
    pub time_limit: f64,
    /// Upper bound for the initial packet speed.
    pub max_speed: f64,
    /// Laplacian stencil used by the wave integrator.
    pub stencil: Stencil,
    /// Splitting scheme used by the wave integrator.
    pub integrator: Integrator,
    /// Number of row bands updated in parallel within a phase.
    pub bands: usize,
    /// Sub-steps taken per `advance` call when the caller does not specify.
    pub sub_steps: usize,
    /// Classical micro-steps per wave sub-step.
    pub classical_micro_steps: usize,
    /// Composition used for each classical micro-step.
    pub classical_scheme: ClassicalScheme,
    /// Tile placement snaps to multiples of this many cells.
    pub placement_spacing: usize,
    /// Radius (in cells) of the proximity search used during picking.
    pub proximity_radius: usize,
    /// Fraction of `time_limit` marked as elapsed after an observation.
    pub observe_time_fraction: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            side_length: 15.0,
            samples_per_side: 199,
            time_step: 0.001,
            max_potential: 30.0,
            boundary_potential: 100.0,
            time_limit: 100.0,
            max_speed: 6.5,
            stencil: Stencil::FourthOrder,
            integrator: Integrator::Leapfrog,
            bands: 2,
            sub_steps: 1,
            classical_micro_steps: 80,
            classical_scheme: ClassicalScheme::ForestRuth,
            placement_spacing: 3,
            proximity_radius: 10,
            observe_time_fraction: 0.95,
        }
    }
}

impl SimConfig {
    /// Smallest grid accepted: the 6th-order stencil reaches three cells out.
    pub const MIN_SAMPLES_PER_SIDE: usize = 7;

    /// Default configuration sized from a total sample count.
    ///
    /// The side count is `floor(sqrt(target_samples))`, so 39601 gives 199.
    pub fn from_target_samples(target_samples: usize) -> Self {
        let samples_per_side = (target_samples as f64).sqrt().floor() as usize;
        Self {
            samples_per_side,
            ..Self::default()
        }
    }

    /// Grid spacing `dR = side_length / (N - 1)`.
    pub fn spacing(&self) -> f64 {
        self.side_length / (self.samples_per_side as f64 - 1.0)
    }

    /// Total number of grid cells.
    pub fn cell_count(&self) -> usize {
        self.samples_per_side * self.samples_per_side
    }

    /// Number of integer potential levels swept during ray picking.
    pub fn picking_levels(&self) -> usize {
        2 * self.max_potential.floor() as usize + 1
    }

    /// Check structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.side_length.is_finite() || self.side_length <= 0.0 {
            return Err(ConfigError::InvalidSideLength {
                value: self.side_length,
            });
        }
        if self.samples_per_side < Self::MIN_SAMPLES_PER_SIDE {
            return Err(ConfigError::GridTooSmall {
                samples_per_side: self.samples_per_side,
                minimum: Self::MIN_SAMPLES_PER_SIDE,
            });
        }
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(ConfigError::InvalidTimeStep {
                value: self.time_step,
            });
        }
        if !self.max_potential.is_finite() || self.max_potential <= 0.0 {
            return Err(ConfigError::InvalidMaxPotential {
                value: self.max_potential,
            });
        }
        if !self.time_limit.is_finite() || self.time_limit <= 0.0 {
            return Err(ConfigError::InvalidTimeLimit {
                value: self.time_limit,
            });
        }
        if self.bands == 0 {
            return Err(ConfigError::ZeroBands);
        }
        if self.classical_micro_steps == 0 {
            return Err(ConfigError::ZeroMicroSteps);
        }
        if self.placement_spacing == 0 {
            return Err(ConfigError::ZeroPlacementSpacing);
        }
        Ok(())
    }
}
