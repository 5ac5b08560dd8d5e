//! Explicit finite-difference integrator for the wavefunction
//!
//! Each phase updates one component in place from the other:
//!
//! ```text
//! Re' = Re + c·dt·(-∇²Im/2 + V·Im)
//! Im' = Im - c·dt·(-∇²Re/2 + V·Re)
//! ```
//!
//! Cells outside the grid read as zero. A phase never reads the component it
//! writes at any cell but its own, so rows can be split into bands and
//! updated in parallel; the phases themselves run strictly in order.
//!
//! The scheme is conditionally stable: `dt` must shrink with `dR²`.

use rayon::prelude::*;

use crate::config::SimConfig;
use crate::geometry::IndexRect;
use crate::wavefunction::WaveFunction;

/// Laplacian stencil
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stencil {
    /// `-1/12, 4/3, -5/2, 4/3, -1/12`
    #[default]
    FourthOrder,
    /// `1/90, -3/20, 3/2, -49/18, 3/2, -3/20, 1/90`
    SixthOrder,
}

impl Stencil {
    /// Weights for offsets `1..=reach` along one axis.
    pub fn weights(&self) -> &'static [f64] {
        static FOURTH: [f64; 2] = [4.0 / 3.0, -1.0 / 12.0];
        static SIXTH: [f64; 3] = [3.0 / 2.0, -3.0 / 20.0, 1.0 / 90.0];
        match self {
            Stencil::FourthOrder => &FOURTH,
            Stencil::SixthOrder => &SIXTH,
        }
    }

    /// Center weight summed over both axes.
    pub fn center(&self) -> f64 {
        match self {
            Stencil::FourthOrder => -5.0,
            Stencil::SixthOrder => -49.0 / 9.0,
        }
    }

    pub fn reach(&self) -> usize {
        self.weights().len()
    }
}

/// Splitting scheme for one time step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Integrator {
    /// `R dt/2, I dt, R dt/2`
    #[default]
    Leapfrog,
    /// Position-extended Forest-Ruth-like, fourth order
    Pefrl,
}

/// Which component a phase writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Real,
    Imaginary,
}

const PEFRL_XI: f64 = 0.178_617_895_844_809_1;
const PEFRL_LAMBDA: f64 = -0.212_341_831_062_605_4;
const PEFRL_CHI: f64 = -0.066_264_582_669_818_49;

impl Integrator {
    /// Phase sequence as `(component, fraction of dt)`.
    pub fn phases(&self) -> Vec<(Component, f64)> {
        use Component::{Imaginary as I, Real as R};
        match self {
            Integrator::Leapfrog => vec![(R, 0.5), (I, 1.0), (R, 0.5)],
            Integrator::Pefrl => {
                let half_outer = (1.0 - 2.0 * PEFRL_LAMBDA) / 2.0;
                let middle = 1.0 - 2.0 * (PEFRL_CHI + PEFRL_XI);
                vec![
                    (R, PEFRL_XI),
                    (I, half_outer),
                    (R, PEFRL_CHI),
                    (I, PEFRL_LAMBDA),
                    (R, middle),
                    (I, PEFRL_LAMBDA),
                    (R, PEFRL_CHI),
                    (I, half_outer),
                    (R, PEFRL_XI),
                ]
            }
        }
    }
}

/// Stateless stepping rules for one grid.
#[derive(Debug, Clone)]
pub struct WaveEngine {
    samples_per_side: usize,
    spacing: f64,
    time_step: f64,
    stencil: Stencil,
    integrator: Integrator,
    bands: usize,
}

impl WaveEngine {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            samples_per_side: config.samples_per_side,
            spacing: config.spacing(),
            time_step: config.time_step,
            stencil: config.stencil,
            integrator: config.integrator,
            bands: config.bands.max(1),
        }
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn stencil(&self) -> Stencil {
        self.stencil
    }

    pub fn integrator(&self) -> Integrator {
        self.integrator
    }

    /// Advance `wave` by one time step under `potential`.
    pub fn step(&self, wave: &mut WaveFunction, potential: &[f64]) {
        debug_assert_eq!(potential.len(), wave.re.len());
        wave.mark_before();
        for (component, fraction) in self.integrator.phases() {
            self.phase(wave, potential, component, fraction * self.time_step);
        }
    }

    /// One in-place update of `component` by `dt`, row bands in parallel.
    fn phase(&self, wave: &mut WaveFunction, potential: &[f64], component: Component, dt: f64) {
        let n = self.samples_per_side;
        let rows_per_band = n.div_ceil(self.bands).max(1);
        let inv_dr2 = 1.0 / (self.spacing * self.spacing);
        let stencil = self.stencil;

        let WaveFunction { re, im, .. } = wave;
        let (target, source, sign) = match component {
            Component::Real => (re, &*im, 1.0),
            Component::Imaginary => (im, &*re, -1.0),
        };

        target
            .par_chunks_mut(rows_per_band * n)
            .enumerate()
            .for_each(|(band, rows)| {
                let first_row = band * rows_per_band;
                for (local, value) in rows.iter_mut().enumerate() {
                    let k = first_row * n + local;
                    let (i, j) = (k / n, k % n);
                    let lap = laplacian(source, n, i, j, stencil) * inv_dr2;
                    *value += sign * dt * (-lap / 2.0 + potential[k] * source[k]);
                }
            });
    }

    /// Riemann sum of `|ψ|²·dR²` over an inclusive index rectangle.
    pub fn sum_probability(&self, wave: &WaveFunction, rect: IndexRect) -> f64 {
        sum_probability(wave, rect, self.spacing)
    }

    /// Probability over the whole grid.
    pub fn total_probability(&self, wave: &WaveFunction) -> f64 {
        let n = self.samples_per_side;
        self.sum_probability(wave, IndexRect::from_corners((0, 0), (n - 1, n - 1)))
    }
}

/// Unscaled Laplacian of `field` at `(i, j)`; missing neighbours are zero.
fn laplacian(field: &[f64], n: usize, i: usize, j: usize, stencil: Stencil) -> f64 {
    let at = |ii: isize, jj: isize| -> f64 {
        if ii < 0 || jj < 0 || ii >= n as isize || jj >= n as isize {
            0.0
        } else {
            field[ii as usize * n + jj as usize]
        }
    };
    let (ci, cj) = (i as isize, j as isize);

    let mut sum = stencil.center() * field[i * n + j];
    for (d, weight) in stencil.weights().iter().enumerate() {
        let o = d as isize + 1;
        sum += weight * (at(ci - o, cj) + at(ci + o, cj) + at(ci, cj - o) + at(ci, cj + o));
    }
    sum
}

/// `Σ (re² + im²)·dR²` over an inclusive rectangle.
pub fn sum_probability(wave: &WaveFunction, rect: IndexRect, spacing: f64) -> f64 {
    let n = wave.samples_per_side();
    let x1 = rect.x1.min(n - 1);
    let y1 = rect.y1.min(n - 1);
    let mut total = 0.0;
    for i in rect.x0..=x1 {
        for j in rect.y0..=y1 {
            let k = i * n + j;
            total += wave.re[k] * wave.re[k] + wave.im[k] * wave.im[k];
        }
    }
    total * spacing * spacing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GridGeometry;
    use crate::wavefunction::Packet;

    fn small_config() -> SimConfig {
        SimConfig {
            samples_per_side: 39,
            ..SimConfig::default()
        }
    }

    #[test]
    fn stencil_weights_sum_to_zero() {
        for stencil in [Stencil::FourthOrder, Stencil::SixthOrder] {
            let ring: f64 = stencil.weights().iter().sum::<f64>() * 4.0;
            assert!((ring + stencil.center()).abs() < 1e-12);
        }
    }

    #[test]
    fn laplacian_of_quadratic_is_exact() {
        // f = i² + j² has ∇² = 4 in index units
        let n = 15;
        let field: Vec<f64> = (0..n * n)
            .map(|k| {
                let (i, j) = ((k / n) as f64, (k % n) as f64);
                i * i + j * j
            })
            .collect();
        for stencil in [Stencil::FourthOrder, Stencil::SixthOrder] {
            assert!((laplacian(&field, n, 7, 7, stencil) - 4.0).abs() < 1e-9);
        }
    }

    #[test]
    fn phase_fractions_sum_to_one() {
        for integrator in [Integrator::Leapfrog, Integrator::Pefrl] {
            let phases = integrator.phases();
            let real: f64 = phases
                .iter()
                .filter(|(c, _)| *c == Component::Real)
                .map(|(_, f)| f)
                .sum();
            let imag: f64 = phases
                .iter()
                .filter(|(c, _)| *c == Component::Imaginary)
                .map(|(_, f)| f)
                .sum();
            assert!((real - 1.0).abs() < 1e-12);
            assert!((imag - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn band_count_does_not_change_result() {
        let config = small_config();
        let geometry = GridGeometry::new(&config);
        let packet = Packet::new(glam::DVec2::new(1.0, 0.5), 45.0, 3.0, 1.0);
        let potential = vec![2.0; geometry.cell_count()];

        let mut single = WaveFunction::from_packet(&geometry, &packet);
        let mut banded = single.clone();
        let one = WaveEngine::new(&SimConfig { bands: 1, ..config.clone() });
        let many = WaveEngine::new(&SimConfig { bands: 5, ..config });
        for _ in 0..10 {
            one.step(&mut single, &potential);
            many.step(&mut banded, &potential);
        }
        assert_eq!(single.re, banded.re);
        assert_eq!(single.im, banded.im);
    }

    #[test]
    fn pefrl_conserves_probability() {
        let config = SimConfig {
            integrator: Integrator::Pefrl,
            ..small_config()
        };
        let geometry = GridGeometry::new(&config);
        let engine = WaveEngine::new(&config);
        let mut wave = WaveFunction::from_packet(&geometry, &Packet::default());
        let potential = vec![0.0; geometry.cell_count()];
        let before = engine.total_probability(&wave);
        for _ in 0..200 {
            engine.step(&mut wave, &potential);
        }
        let after = engine.total_probability(&wave);
        assert!((after - before).abs() / before < 0.01);
    }
}
