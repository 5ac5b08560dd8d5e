//! Position measurement: weighted sampling and collapse

use std::f64::consts::PI;

use glam::DVec2;
use rand::Rng;

use crate::geometry::{CellIndex, GridGeometry};
use crate::wavefunction::WaveFunction;

/// Running sum of `|ψ|²·dR²` over cells in storage order.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityLedger {
    cumulative: Vec<f64>,
}

impl ProbabilityLedger {
    pub fn build(wave: &WaveFunction, spacing: f64) -> Self {
        let area = spacing * spacing;
        let mut running = 0.0;
        let cumulative = wave
            .re
            .iter()
            .zip(&wave.im)
            .map(|(re, im)| {
                running += (re * re + im * im) * area;
                running
            })
            .collect();
        Self { cumulative }
    }

    /// Ledger from raw per-cell probabilities.
    pub fn from_probabilities(probabilities: &[f64]) -> Self {
        let mut running = 0.0;
        let cumulative = probabilities
            .iter()
            .map(|p| {
                running += p;
                running
            })
            .collect();
        Self { cumulative }
    }

    pub fn entries(&self) -> &[f64] {
        &self.cumulative
    }

    pub fn len(&self) -> usize {
        self.cumulative.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cumulative.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.cumulative.last().copied().unwrap_or(0.0)
    }

    /// Flat index selected by `u ∈ [0, 1)`.
    ///
    /// The first entry `≥ u` is chosen; ties with earlier entries resolve to
    /// the first cell of the run. When `u` exceeds the total the last
    /// contributing cell is chosen. A cell that contributes nothing is never
    /// chosen unless everything is zero.
    pub fn sample(&self, u: f64) -> Option<usize> {
        if self.cumulative.is_empty() {
            return None;
        }
        let last = self.cumulative.len() - 1;
        let mut index = self.cumulative.partition_point(|&c| c < u).min(last);

        if u == 0.0 {
            while index < last && self.cumulative[index] == 0.0 {
                index += 1;
            }
        } else {
            while index > 0 && self.cumulative[index - 1] == self.cumulative[index] {
                index -= 1;
            }
        }
        Some(index)
    }

    pub fn sample_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<usize> {
        self.sample(rng.gen::<f64>())
    }
}

/// Outcome of one observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub cell: CellIndex,
    /// World position of the sampled cell
    pub position: DVec2,
}

pub struct MeasurementEngine {
    geometry: GridGeometry,
}

impl MeasurementEngine {
    pub fn new(geometry: GridGeometry) -> Self {
        Self { geometry }
    }

    pub fn build_ledger(&self, wave: &WaveFunction) -> ProbabilityLedger {
        ProbabilityLedger::build(wave, self.geometry.spacing())
    }

    /// Draw a cell from `|ψ|²`.
    pub fn sample<R: Rng + ?Sized>(&self, wave: &WaveFunction, rng: &mut R) -> Option<Measurement> {
        let ledger = self.build_ledger(wave);
        let cell = self.geometry.unflatten(ledger.sample_with(rng)?);
        Some(Measurement {
            cell,
            position: self.geometry.cell_center(cell),
        })
    }

    /// Multiply `ψ` by a Gaussian `exp(-p·d²)/sqrt(π/2p)` around `point`, then
    /// rescale so the total probability is 1.
    ///
    /// Returns the total before rescaling. A field that vanishes everywhere
    /// is left at zero. `precision` must be positive and finite; any other
    /// value leaves `ψ` untouched.
    pub fn collapse(&self, wave: &mut WaveFunction, point: DVec2, precision: f64) -> f64 {
        if !(precision > 0.0 && precision.is_finite()) {
            log::warn!("ignoring collapse with precision {precision}");
            return self.build_ledger(wave).total();
        }
        let g = &self.geometry;
        let n = g.samples_per_side();
        let norm = 1.0 / (PI / (2.0 * precision)).sqrt();

        for i in 0..n {
            let x = g.index_to_world(i);
            for j in 0..n {
                let d2 = DVec2::new(x, g.index_to_world(j)).distance_squared(point);
                let factor = (-d2 * precision).exp() * norm;
                let k = i * n + j;
                wave.re[k] *= factor;
                wave.im[k] *= factor;
            }
        }

        let total = self.build_ledger(wave).total();
        if total > 0.0 && total.is_finite() {
            wave.scale((1.0 / total).sqrt());
        } else {
            log::warn!("collapse at {point} left no probability to renormalize");
        }
        wave.mark_before();
        total
    }

    /// Sample a position and collapse onto it.
    pub fn observe<R: Rng + ?Sized>(
        &self,
        wave: &mut WaveFunction,
        precision: f64,
        rng: &mut R,
    ) -> Option<Measurement> {
        let measurement = self.sample(wave, rng)?;
        self.collapse(wave, measurement.position, precision);
        log::info!(
            "observed particle at cell {:?} ({:.3}, {:.3})",
            measurement.cell,
            measurement.position.x,
            measurement.position.y
        );
        Some(measurement)
    }
}
