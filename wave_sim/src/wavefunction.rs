//! Wavefunction storage and the Gaussian initial packet
//!
//! The complex field lives in two flat grids (`re`, `im`) rather than a grid
//! of complex numbers. The integrator updates one component while reading the
//! other, so keeping them apart lets it borrow both at once.

use std::f64::consts::PI;

use glam::DVec2;

use crate::geometry::{CellIndex, GridGeometry};

/// Complex amplitude at a single point
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Complex {
    pub re: f64,
    pub im: f64,
}

impl Complex {
    pub fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    /// Create from polar form: r * e^(i*theta)
    pub fn from_polar(r: f64, theta: f64) -> Self {
        Self {
            re: r * theta.cos(),
            im: r * theta.sin(),
        }
    }

    /// Magnitude squared |z|^2 = probability density
    pub fn norm_sq(&self) -> f64 {
        self.re * self.re + self.im * self.im
    }
}

/// Round to a fixed number of decimal places.
pub fn round_to_decimals(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Initial Gaussian packet parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Packet {
    /// World-space center
    pub center: DVec2,
    /// Direction of travel in degrees
    pub angle: f64,
    pub speed: f64,
    /// Width parameter `p` in `exp(-p r²)`; larger is narrower
    pub precision: f64,
}

impl Default for Packet {
    fn default() -> Self {
        Self {
            center: DVec2::ZERO,
            angle: 0.0,
            speed: 0.0,
            precision: 1.0,
        }
    }
}

impl Packet {
    pub fn new(center: DVec2, angle: f64, speed: f64, precision: f64) -> Self {
        Self {
            center,
            angle,
            speed,
            precision,
        }
    }

    /// Velocity components, each rounded to two decimals. The same rounded
    /// vector seeds both the wave number and the classical particle.
    pub fn velocity(&self) -> DVec2 {
        let radians = self.angle.to_radians();
        DVec2::new(
            round_to_decimals(self.speed * radians.cos(), 2),
            round_to_decimals(self.speed * radians.sin(), 2),
        )
    }

    /// Unit direction of travel.
    pub fn direction(&self) -> DVec2 {
        let radians = self.angle.to_radians();
        DVec2::new(radians.cos(), radians.sin())
    }

    /// Amplitude normalization `1 / sqrt(π / 2p)`.
    pub fn normalization(&self) -> f64 {
        1.0 / (PI / (2.0 * self.precision)).sqrt()
    }

    /// ψ(x, y) = exp(-p·r²)·e^{i k·r} / sqrt(π / 2p)
    pub fn amplitude(&self, x: f64, y: f64) -> Complex {
        let offset = DVec2::new(x, y) - self.center;
        let envelope = (-self.precision * offset.length_squared()).exp() * self.normalization();
        Complex::from_polar(envelope, self.velocity().dot(offset))
    }
}

/// Real and imaginary grids plus their pre-step copies.
#[derive(Debug, Clone)]
pub struct WaveFunction {
    samples_per_side: usize,
    pub re: Vec<f64>,
    pub im: Vec<f64>,
    /// Values at the start of the most recent step.
    pub re_before: Vec<f64>,
    pub im_before: Vec<f64>,
}

impl WaveFunction {
    /// All-zero field.
    pub fn new(geometry: &GridGeometry) -> Self {
        let cells = geometry.cell_count();
        Self {
            samples_per_side: geometry.samples_per_side(),
            re: vec![0.0; cells],
            im: vec![0.0; cells],
            re_before: vec![0.0; cells],
            im_before: vec![0.0; cells],
        }
    }

    /// Field initialized from a packet.
    pub fn from_packet(geometry: &GridGeometry, packet: &Packet) -> Self {
        let mut wave = Self::new(geometry);
        wave.initialize(geometry, packet);
        wave
    }

    /// Overwrite every cell with the packet amplitude.
    pub fn initialize(&mut self, geometry: &GridGeometry, packet: &Packet) {
        let n = self.samples_per_side;
        for i in 0..n {
            let x = geometry.index_to_world(i);
            for j in 0..n {
                let psi = packet.amplitude(x, geometry.index_to_world(j));
                let k = i * n + j;
                self.re[k] = psi.re;
                self.im[k] = psi.im;
            }
        }
        self.mark_before();
    }

    /// Copy the current field into the pre-step buffers.
    pub fn mark_before(&mut self) {
        self.re_before.copy_from_slice(&self.re);
        self.im_before.copy_from_slice(&self.im);
    }

    pub fn samples_per_side(&self) -> usize {
        self.samples_per_side
    }

    pub fn at(&self, (i, j): CellIndex) -> Complex {
        let k = i * self.samples_per_side + j;
        Complex::new(self.re[k], self.im[k])
    }

    pub fn density(&self, cell: CellIndex) -> f64 {
        self.at(cell).norm_sq()
    }

    /// Multiply every cell by a real factor.
    pub fn scale(&mut self, factor: f64) {
        self.re.iter_mut().for_each(|v| *v *= factor);
        self.im.iter_mut().for_each(|v| *v *= factor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;

    #[test]
    fn velocity_is_rounded() {
        let packet = Packet::new(DVec2::ZERO, 30.0, 1.0, 1.0);
        let v = packet.velocity();
        assert_eq!(v.x, 0.87);
        assert_eq!(v.y, 0.5);
    }

    #[test]
    fn amplitude_peaks_at_center() {
        let packet = Packet::new(DVec2::new(1.0, -1.0), 0.0, 0.0, 2.0);
        let peak = packet.amplitude(1.0, -1.0);
        assert!((peak.re - packet.normalization()).abs() < 1e-12);
        assert_eq!(peak.im, 0.0);
        assert!(packet.amplitude(3.0, -1.0).norm_sq() < peak.norm_sq());
    }

    #[test]
    fn initialize_fills_before_buffers() {
        let geometry = GridGeometry::new(&SimConfig {
            samples_per_side: 39,
            ..SimConfig::default()
        });
        let wave = WaveFunction::from_packet(&geometry, &Packet::default());
        assert_eq!(wave.re, wave.re_before);
        assert!(wave.density((19, 19)) > wave.density((0, 0)));
    }
}
