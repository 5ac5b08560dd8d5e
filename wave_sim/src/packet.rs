//! Interactive editing of the initial packet
//!
//! The editor keeps two copies: `current` follows every drag, `saved` is
//! the last confirmed state. A drag that ends with `preview = false` (or a
//! call to [`PacketEditor::confirm`]) promotes `current` to `saved`.

use glam::DVec2;

use crate::config::SimConfig;
use crate::constants::{MAX_PACKET_PRECISION, MIN_PACKET_PRECISION, ROUND_TO_ZERO};
use crate::geometry::GridGeometry;
use crate::wavefunction::{Packet, WaveFunction};

/// Pointer distance (world units) within which the velocity arrow is hit.
pub const ARROW_HIT_RADIUS: f64 = 0.5;

/// Fraction of the side length the arrow spans at maximum speed.
const ARROW_REACH: f64 = 0.25;

#[derive(Debug, Clone, PartialEq)]
pub struct PacketEditor {
    current: Packet,
    saved: Packet,
    max_speed: f64,
    side_length: f64,
}

impl PacketEditor {
    pub fn new(config: &SimConfig, packet: Packet) -> Self {
        Self {
            current: packet,
            saved: packet,
            max_speed: config.max_speed,
            side_length: config.side_length,
        }
    }

    pub fn current(&self) -> &Packet {
        &self.current
    }

    pub fn saved(&self) -> &Packet {
        &self.saved
    }

    /// Whether `current` has unconfirmed changes.
    pub fn is_preview(&self) -> bool {
        self.current != self.saved
    }

    pub fn confirm(&mut self) {
        self.saved = self.current;
    }

    pub fn restore_saved(&mut self) {
        self.current = self.saved;
    }

    /// Replace both copies.
    pub fn replace(&mut self, packet: Packet) {
        self.current = packet;
        self.saved = packet;
    }

    fn commit_unless(&mut self, preview: bool) {
        if !preview {
            self.confirm();
        }
    }

    pub fn set_speed(&mut self, speed: f64, preview: bool) {
        self.current.speed = speed.clamp(0.0, self.max_speed);
        self.commit_unless(preview);
    }

    pub fn set_angle(&mut self, degrees: f64, preview: bool) {
        self.current.angle = degrees.rem_euclid(360.0);
        self.commit_unless(preview);
    }

    /// Changing the width recenters the packet at the origin.
    pub fn set_precision(&mut self, precision: f64, preview: bool) {
        self.current.precision = precision.clamp(MIN_PACKET_PRECISION, MAX_PACKET_PRECISION);
        self.current.center = DVec2::ZERO;
        self.commit_unless(preview);
    }

    /// Move the center to the grid point nearest `target`, keeping the whole
    /// packet (as measured on `wave`) inside the walls.
    pub fn set_center(
        &mut self,
        target: DVec2,
        wave: &WaveFunction,
        geometry: &GridGeometry,
        preview: bool,
    ) {
        let radius = measure_radius(&self.current, wave, geometry);
        let limit = (geometry.half_side() - radius).max(0.0);
        let half = geometry.half_side();
        let cell = geometry.nearest_cell(
            target.x.clamp(-half, half),
            target.y.clamp(-half, half),
        );
        let snapped = geometry.cell_center(cell);
        self.current.center = snapped.clamp(DVec2::splat(-limit), DVec2::splat(limit));
        self.commit_unless(preview);
    }

    /// Set speed and angle from an arrow dragged to `point`.
    pub fn set_velocity_from_point(&mut self, point: DVec2, preview: bool) {
        let reach = ARROW_REACH * self.side_length;
        let offset = point - self.current.center;
        let stretch = offset.length().min(reach);

        self.current.speed = stretch * self.max_speed / reach;
        self.current.angle = arrow_angle(offset);
        self.commit_unless(preview);
    }

    /// World position of the arrow tip.
    pub fn arrow_tip(&self) -> DVec2 {
        let reach = ARROW_REACH * self.side_length;
        self.current.center + self.current.direction() * reach * self.current.speed / self.max_speed
    }

    pub fn within_arrow_vicinity(&self, point: DVec2) -> bool {
        point.distance(self.arrow_tip()) <= ARROW_HIT_RADIUS
    }

    /// Whether `point` lies where the packet has non-negligible density.
    pub fn within_packet_vicinity(
        &self,
        point: DVec2,
        wave: &WaveFunction,
        geometry: &GridGeometry,
    ) -> bool {
        if !geometry.contains_world(point.x, point.y) {
            return false;
        }
        wave.density(geometry.nearest_cell(point.x, point.y)) >= ROUND_TO_ZERO
    }
}

/// Angle of `offset` in degrees within `[0, 360)`.
fn arrow_angle(offset: DVec2) -> f64 {
    if offset.x == 0.0 {
        return match offset.y.partial_cmp(&0.0) {
            Some(std::cmp::Ordering::Less) => 270.0,
            Some(std::cmp::Ordering::Greater) => 90.0,
            _ => 0.0,
        };
    }
    let mut angle = (offset.y / offset.x).atan().to_degrees();
    if offset.x < 0.0 {
        angle += 180.0;
    } else if offset.y < 0.0 {
        angle += 360.0;
    }
    angle
}

/// Distance from the packet center to where its amplitude first drops
/// below [`ROUND_TO_ZERO`] along x, scanning toward the far wall.
pub fn measure_radius(packet: &Packet, wave: &WaveFunction, geometry: &GridGeometry) -> f64 {
    let half = geometry.half_side();
    let center = packet.center.clamp(DVec2::splat(-half), DVec2::splat(half));
    let (ci, cj) = geometry.nearest_cell(center.x, center.y);
    let negligible = |i: usize| {
        let psi = wave.at((i, cj));
        psi.re.abs() < ROUND_TO_ZERO && psi.im.abs() < ROUND_TO_ZERO
    };

    let edge = if center.x <= 0.0 {
        (ci..geometry.samples_per_side()).find(|&i| negligible(i))
    } else {
        (0..=ci).rev().find(|&i| negligible(i))
    };

    match edge {
        Some(i) => (geometry.index_to_world(i) - center.x).abs(),
        None => half - center.x.abs(),
    }
}
