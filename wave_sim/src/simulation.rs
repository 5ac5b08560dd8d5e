//! The simulation owner
//!
//! [`Simulation`] ties the potential field, wavefunction, classical particle
//! and packet editor together and exposes the operations a host drives from
//! pointer input and its frame loop. Every mutation records a dirty region.

use common::Ray;
use glam::DVec2;
use rand::Rng;

use crate::classical::{ClassicalEngine, ClassicalParticle};
use crate::clock::{AdvanceOutcome, FrameState, SimulationClock};
use crate::config::SimConfig;
use crate::error::{EquationError, SimError};
use crate::geometry::{CellIndex, GridGeometry, IndexRect};
use crate::measurement::{Measurement, MeasurementEngine};
use crate::packet::PacketEditor;
use crate::potential::{BrushSettings, CoveringRect, EditMode, PotentialField};
use crate::snapshot::{ChangeKind, DirtyRegion, DirtyTracker, FrameSnapshot, SimObserver};
use crate::source::{PotentialSource, SourceCheck};
use crate::wave::WaveEngine;
use crate::wavefunction::{Packet, WaveFunction};

/// Everything stored for one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSample {
    pub position: DVec2,
    pub re: f64,
    pub im: f64,
    pub re_before: f64,
    pub im_before: f64,
    pub v: f64,
    pub v_preview: f64,
    pub covered: bool,
}

/// Rectangle on the ground plane whose probability is reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct ProbabilityNet {
    anchor: Option<CellIndex>,
    stretch: Option<CellIndex>,
}

impl ProbabilityNet {
    fn rect(&self) -> Option<IndexRect> {
        Some(IndexRect::from_corners(self.anchor?, self.stretch?))
    }
}

pub struct Simulation {
    config: SimConfig,
    geometry: GridGeometry,
    potential: PotentialField,
    wave: WaveFunction,
    particle: ClassicalParticle,
    wave_engine: WaveEngine,
    classical_engine: ClassicalEngine,
    measurement: MeasurementEngine,
    clock: SimulationClock,
    packet: PacketEditor,
    net: ProbabilityNet,
    dirty: DirtyTracker,
    observers: Vec<Box<dyn SimObserver>>,
}

impl Simulation {
    /// Validate `config` and start from the default packet on a flat potential.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        Self::with_packet(config, Packet::default())
    }

    pub fn with_packet(config: SimConfig, packet: Packet) -> Result<Self, SimError> {
        config.validate()?;
        let geometry = GridGeometry::new(&config);
        let wave = WaveFunction::from_packet(&geometry, &packet);
        let particle = ClassicalParticle::new(packet.center, packet.velocity());

        log::info!(
            "simulation created: {}x{} grid, side {}, dt {}",
            config.samples_per_side,
            config.samples_per_side,
            config.side_length,
            config.time_step
        );

        Ok(Self {
            geometry,
            potential: PotentialField::new(&config),
            wave,
            particle,
            wave_engine: WaveEngine::new(&config),
            classical_engine: ClassicalEngine::new(&config),
            measurement: MeasurementEngine::new(geometry),
            clock: SimulationClock::new(&config),
            packet: PacketEditor::new(&config, packet),
            net: ProbabilityNet::default(),
            dirty: DirtyTracker::default(),
            observers: Vec::new(),
            config,
        })
    }

    // ── accessors ──────────────────────────────────────────────────

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn potential(&self) -> &PotentialField {
        &self.potential
    }

    pub fn wave(&self) -> &WaveFunction {
        &self.wave
    }

    pub fn particle(&self) -> &ClassicalParticle {
        &self.particle
    }

    pub fn packet(&self) -> &PacketEditor {
        &self.packet
    }

    pub fn elapsed(&self) -> f64 {
        self.clock.elapsed()
    }

    pub fn remaining(&self) -> f64 {
        self.clock.remaining()
    }

    pub fn sample(&self, cell: CellIndex) -> Result<GridSample, SimError> {
        self.check_cell(cell)?;
        let k = self.geometry.flat(cell);
        Ok(GridSample {
            position: self.geometry.cell_center(cell),
            re: self.wave.re[k],
            im: self.wave.im[k],
            re_before: self.wave.re_before[k],
            im_before: self.wave.im_before[k],
            v: self.potential.values()[k],
            v_preview: self.potential.preview_values()[k],
            covered: self.potential.covered()[k],
        })
    }

    fn check_cell(&self, cell: CellIndex) -> Result<(), SimError> {
        let side = self.geometry.samples_per_side();
        if cell.0 >= side || cell.1 >= side {
            return Err(SimError::IndexOutOfBounds { index: cell, side });
        }
        Ok(())
    }

    // ── notifications ──────────────────────────────────────────────

    pub fn add_observer(&mut self, observer: Box<dyn SimObserver>) {
        self.observers.push(observer);
    }

    fn record(&mut self, kind: ChangeKind, rect: IndexRect) {
        let region = DirtyRegion::new(kind, rect);
        for observer in &mut self.observers {
            observer.on_change(&region);
        }
        self.dirty.record(region);
    }

    fn record_potential(&mut self, rect: IndexRect) {
        self.record(ChangeKind::Potential, rect);
        self.record(ChangeKind::PreviewPotential, rect);
    }

    /// Drain dirty regions recorded since the last call.
    pub fn take_dirty(&mut self) -> Vec<DirtyRegion> {
        self.dirty.take()
    }

    /// Copy the host-visible state and drain dirty regions.
    pub fn snapshot(&mut self) -> FrameSnapshot {
        FrameSnapshot {
            geometry: self.geometry,
            re: self.wave.re.clone(),
            im: self.wave.im.clone(),
            potential: self.potential.values().to_vec(),
            preview_potential: self.potential.preview_values().to_vec(),
            particle: self.particle,
            packet: *self.packet.current(),
            elapsed: self.clock.elapsed(),
            remaining: self.clock.remaining(),
            dirty: self.dirty.take(),
        }
    }

    // ── time ───────────────────────────────────────────────────────

    /// Reinitialize the wavefunction and particle from the current packet
    /// and rewind the clock.
    pub fn reset(&mut self) {
        let packet = *self.packet.current();
        self.wave.initialize(&self.geometry, &packet);
        self.particle = ClassicalParticle::new(packet.center, packet.velocity());
        self.clock.reset();
        let full = self.geometry.full_rect();
        self.record(ChangeKind::Wavefunction, full);
        self.record(ChangeKind::Particle, full);
        log::info!(
            "simulation reset: packet at ({:.3}, {:.3}), speed {}, angle {}",
            packet.center.x,
            packet.center.y,
            packet.speed,
            packet.angle
        );
    }

    /// Advance by the configured number of sub-steps.
    pub fn advance_frame(&mut self) -> AdvanceOutcome {
        self.advance(self.config.sub_steps)
    }

    /// Advance by `sub_steps`; a no-op once the time limit is reached.
    pub fn advance(&mut self, sub_steps: usize) -> AdvanceOutcome {
        if self.clock.is_at_start() {
            let packet = *self.packet.current();
            self.wave.initialize(&self.geometry, &packet);
            self.particle = ClassicalParticle::new(packet.center, packet.velocity());
        }

        let outcome = self.clock.advance(
            sub_steps,
            FrameState {
                wave_engine: &self.wave_engine,
                classical_engine: &self.classical_engine,
                potential: &self.potential,
                wave: &mut self.wave,
                particle: &mut self.particle,
            },
        );
        if outcome.steps > 0 {
            let full = self.geometry.full_rect();
            self.record(ChangeKind::Wavefunction, full);
            self.record(ChangeKind::Particle, full);
        }
        outcome
    }

    // ── probability ────────────────────────────────────────────────

    /// `Σ |ψ|²·dR²` over the inclusive index ranges `[x1, x2] × [y1, y2]`.
    pub fn sum_probability(
        &self,
        x1: usize,
        x2: usize,
        y1: usize,
        y2: usize,
    ) -> Result<f64, SimError> {
        self.check_cell((x1, y1))?;
        self.check_cell((x2, y2))?;
        let rect = IndexRect::from_corners((x1, y1), (x2, y2));
        Ok(self.wave_engine.sum_probability(&self.wave, rect))
    }

    pub fn total_probability(&self) -> f64 {
        self.wave_engine.total_probability(&self.wave)
    }

    /// Anchor the probability net where `ray` meets the ground plane.
    pub fn set_net_anchor(&mut self, ray: &Ray) -> CellIndex {
        let cell = self.geometry.closest_index_flat(ray, 1);
        self.net = ProbabilityNet {
            anchor: Some(cell),
            stretch: Some(cell),
        };
        cell
    }

    /// Drag the far corner of the probability net.
    pub fn set_net_stretch(&mut self, ray: &Ray) -> Option<CellIndex> {
        self.net.anchor?;
        let cell = self.geometry.closest_index_flat(ray, 1);
        self.net.stretch = Some(cell);
        Some(cell)
    }

    pub fn net_rect(&self) -> Option<IndexRect> {
        self.net.rect()
    }

    pub fn clear_net(&mut self) {
        self.net = ProbabilityNet::default();
    }

    /// Probability inside the net, if one is placed.
    pub fn netted_probability(&self) -> Option<f64> {
        let rect = self.net.rect()?;
        Some(self.wave_engine.sum_probability(&self.wave, rect))
    }

    /// Measure the position with the thread-local RNG.
    pub fn observe(&mut self, precision: f64) -> Option<Measurement> {
        self.observe_with(precision, &mut rand::thread_rng())
    }

    /// Measure the position, collapse onto it, and jump the clock near its
    /// end.
    pub fn observe_with<R: Rng + ?Sized>(
        &mut self,
        precision: f64,
        rng: &mut R,
    ) -> Option<Measurement> {
        self.clock.set_fraction(self.config.observe_time_fraction);
        let measurement = self.measurement.observe(&mut self.wave, precision, rng)?;
        self.record(ChangeKind::Wavefunction, self.geometry.full_rect());
        Some(measurement)
    }

    // ── potential editing ──────────────────────────────────────────

    /// Install a new potential source. The grid is untouched on error.
    pub fn set_source(
        &mut self,
        source: Box<dyn PotentialSource>,
    ) -> Result<SourceCheck, EquationError> {
        let check = self.potential.set_source(source)?;
        self.record_potential(self.geometry.full_rect());
        Ok(check)
    }

    pub fn clear_potential(&mut self) {
        self.potential.clear();
        self.record_potential(self.geometry.full_rect());
    }

    pub fn edit_mode(&self) -> Option<EditMode> {
        self.potential.edit_mode()
    }

    pub fn begin_tile_edit(&mut self, ray: &Ray) -> IndexRect {
        let rect = self.potential.begin_tile_edit(ray);
        self.record(ChangeKind::PreviewPotential, rect);
        rect
    }

    pub fn update_tile_stretch(&mut self, ray: &Ray) -> Option<IndexRect> {
        let rect = self.potential.update_tile_stretch(ray)?;
        self.record(ChangeKind::PreviewPotential, rect);
        Some(rect)
    }

    pub fn set_tile_level_from_stretch(&mut self, stretch: f64) -> Option<IndexRect> {
        let rect = self.potential.set_tile_level_from_stretch(stretch)?;
        self.record(ChangeKind::PreviewPotential, rect);
        Some(rect)
    }

    pub fn confirm_edit(&mut self) -> Option<IndexRect> {
        let rect = self.potential.confirm_edit()?;
        self.record_potential(rect);
        Some(rect)
    }

    pub fn cancel_edit(&mut self) -> Option<IndexRect> {
        let rect = self.potential.cancel_edit()?;
        self.record(ChangeKind::PreviewPotential, rect);
        Some(rect)
    }

    pub fn set_brush_params(&mut self, height: f64, precision: f64) {
        self.potential.set_brush_params(height, precision);
    }

    pub fn brush(&self) -> &BrushSettings {
        self.potential.brush()
    }

    pub fn set_brush_center(&mut self, ray: &Ray) -> CellIndex {
        self.potential.set_brush_center(ray)
    }

    pub fn begin_brush_edit(&mut self, ray: &Ray) -> IndexRect {
        let rect = self.potential.begin_brush_edit(ray);
        self.record_potential(rect);
        rect
    }

    pub fn update_brush_edit(&mut self, ray: &Ray) -> IndexRect {
        let rect = self.potential.update_brush_edit(ray);
        self.record_potential(rect);
        rect
    }

    pub fn paint_brush(&mut self, center: DVec2, radius: f64, height: f64) -> IndexRect {
        let rect = self.potential.paint_brush(center, radius, height);
        self.record_potential(rect);
        rect
    }

    pub fn find_covering_rectangles(&mut self, preview: bool) -> Vec<CoveringRect> {
        self.potential.find_covering_rectangles(preview)
    }

    // ── packet editing ─────────────────────────────────────────────

    fn packet_changed(&mut self) {
        self.reset();
        self.record(ChangeKind::Packet, self.geometry.full_rect());
    }

    /// Replace the packet outright (both copies) and reset.
    pub fn set_packet(&mut self, packet: Packet) {
        self.packet.replace(packet);
        self.packet_changed();
    }

    pub fn set_packet_speed(&mut self, speed: f64, preview: bool) {
        self.packet.set_speed(speed, preview);
        self.packet_changed();
    }

    pub fn set_packet_angle(&mut self, degrees: f64, preview: bool) {
        self.packet.set_angle(degrees, preview);
        self.packet_changed();
    }

    pub fn set_packet_precision(&mut self, precision: f64, preview: bool) {
        self.packet.set_precision(precision, preview);
        self.packet_changed();
    }

    pub fn set_packet_center(&mut self, point: DVec2, preview: bool) {
        self.packet
            .set_center(point, &self.wave, &self.geometry, preview);
        self.packet_changed();
    }

    pub fn set_packet_velocity_from_point(&mut self, point: DVec2, preview: bool) {
        self.packet.set_velocity_from_point(point, preview);
        self.packet_changed();
    }

    pub fn confirm_packet(&mut self) {
        self.packet.confirm();
    }

    /// Save whatever the packet currently is as the confirmed state.
    pub fn save_current_state(&mut self) {
        self.packet.confirm();
    }

    pub fn restore_saved_packet(&mut self) {
        self.packet.restore_saved();
        self.packet_changed();
    }

    pub fn is_packet_preview(&self) -> bool {
        self.packet.is_preview()
    }

    pub fn arrow_tip(&self) -> DVec2 {
        self.packet.arrow_tip()
    }

    pub fn within_arrow_vicinity(&self, point: DVec2) -> bool {
        self.packet.within_arrow_vicinity(point)
    }

    pub fn within_packet_vicinity(&self, point: DVec2) -> bool {
        self.packet
            .within_packet_vicinity(point, &self.wave, &self.geometry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Flat;
    use glam::DVec3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::{Arc, Mutex};

    fn small() -> Simulation {
        Simulation::new(SimConfig {
            samples_per_side: 39,
            ..SimConfig::default()
        })
        .expect("valid config")
    }

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<ChangeKind>>>);

    impl SimObserver for Recorder {
        fn on_change(&mut self, region: &DirtyRegion) {
            if let Ok(mut kinds) = self.0.lock() {
                kinds.push(region.kind);
            }
        }
    }

    #[test]
    fn rejects_invalid_config() {
        let result = Simulation::new(SimConfig {
            bands: 0,
            ..SimConfig::default()
        });
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn sample_bounds_are_checked() {
        let sim = small();
        assert!(sim.sample((38, 38)).is_ok());
        assert_eq!(
            sim.sample((39, 0)),
            Err(SimError::IndexOutOfBounds {
                index: (39, 0),
                side: 39
            })
        );
        assert!(sim.sum_probability(0, 40, 0, 1).is_err());
    }

    #[test]
    fn observers_see_edits_and_steps() {
        let mut sim = small();
        let recorder = Recorder::default();
        sim.add_observer(Box::new(recorder.clone()));

        sim.paint_brush(DVec2::ZERO, 1.0, 3.0);
        sim.advance(1);
        let kinds = recorder.0.lock().map(|k| k.clone()).unwrap_or_default();
        assert!(kinds.contains(&ChangeKind::Potential));
        assert!(kinds.contains(&ChangeKind::Wavefunction));

        let snapshot = sim.snapshot();
        assert!(!snapshot.dirty.is_empty());
        assert!(sim.take_dirty().is_empty());
    }

    #[test]
    fn packet_setters_reset_the_run() {
        let mut sim = small();
        sim.advance(5);
        assert!(sim.elapsed() > 0.0);
        sim.set_packet_speed(3.0, true);
        assert_eq!(sim.elapsed(), 0.0);
        assert!(sim.is_packet_preview());
        sim.restore_saved_packet();
        assert!(!sim.is_packet_preview());
        assert_eq!(sim.packet().current().speed, 0.0);
    }

    #[test]
    fn observe_jumps_clock_and_normalizes() {
        let mut sim = small();
        let mut rng = StdRng::seed_from_u64(3);
        let m = sim.observe_with(24.0, &mut rng).expect("measurement");
        assert!((sim.elapsed() - 95.0).abs() < 1e-9);
        assert!((sim.total_probability() - 1.0).abs() < 1e-6);
        assert!(m.position.x.abs() <= 7.5 && m.position.y.abs() <= 7.5);
    }

    #[test]
    fn net_reports_probability_inside() {
        let mut sim = small();
        let g = *sim.geometry();
        let down = |x: f64, y: f64| {
            Ray::new(
                DVec3::new(g.world_to_display(x), g.world_to_display(y), 1.0),
                DVec3::new(0.0, 0.0, -1.0),
            )
        };
        assert_eq!(sim.netted_probability(), None);
        sim.set_net_anchor(&down(-7.0, -7.0));
        sim.set_net_stretch(&down(7.0, 7.0));
        let netted = sim.netted_probability().expect("net placed");
        assert!((netted - sim.total_probability()).abs() < 1e-3);
    }

    #[test]
    fn equation_errors_leave_potential_alone() {
        let mut sim = small();
        assert_eq!(sim.set_source(Box::new(Flat(2.0))), Ok(SourceCheck::Clean));
        let bad = crate::source::FnSource::new("asin(x)", |x: f64, _| x.asin());
        assert!(sim.set_source(Box::new(bad)).is_err());
        assert!(sim.potential().values().iter().all(|&v| v == 2.0));
    }
}
