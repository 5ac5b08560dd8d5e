//! Wavepacket Sandbox Engine
//!
//! A 2D quantum wavepacket, and a classical particle alongside it, moving
//! through an editable potential on a square grid:
//!
//! - **Wave integration**: explicit finite differences on separate real and
//!   imaginary grids, with row bands updated in parallel
//! - **Classical companion**: a point particle integrated under `-∇V`
//!   concurrently with the wave
//! - **Potential editing**: tile and brush edits with preview/confirm
//! - **Measurement**: weighted position sampling and collapse
//! - **Picking**: mapping pointer rays onto the potential surface
//!
//! Rendering and widgets live in the host; this crate hands out snapshots
//! and dirty regions.

pub mod classical;
pub mod clock;
pub mod config;
pub mod error;
pub mod geometry;
pub mod measurement;
pub mod packet;
pub mod potential;
pub mod scenario;
pub mod shared;
pub mod simulation;
pub mod snapshot;
pub mod source;
pub mod wave;
pub mod wavefunction;

pub use config::{ConfigError, SimConfig};
pub use error::{EquationError, SimError};
pub use shared::SharedSimulation;
pub use simulation::{GridSample, Simulation};

/// Numeric constants shared across the engine
pub mod constants {
    /// Amplitudes and potentials below this are treated as zero
    pub const ROUND_TO_ZERO: f64 = 1e-3;

    /// Lift added to every potential height so the surface sits above z = 0
    pub const DISPLAY_Z_OFFSET: f64 = 0.001;

    /// Brush precision range; higher is a narrower dab
    pub const MIN_BRUSH_PRECISION: f64 = 0.5;
    pub const MAX_BRUSH_PRECISION: f64 = 25.0;

    /// Scales brush precision into a Gaussian spread
    pub const BRUSH_FACTOR: f64 = 0.15;

    /// Packet precision range
    pub const MIN_PACKET_PRECISION: f64 = 0.2;
    pub const MAX_PACKET_PRECISION: f64 = 4.0;

    /// Collapse precision used for host-triggered observations
    pub const OBSERVE_PRECISION: f64 = 24.0;
}
