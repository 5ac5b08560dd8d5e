//! Coordinate systems of the simulation grid
//!
//! Four systems are in play:
//! - **index**: integer `(i, j)` positions in the `N x N` grid
//! - **world**: physical coordinates, `[-S/2, S/2]` on both axes
//! - **display**: world scaled to `[-1, 1]`, used by hosts for drawing and picking
//! - **potential height**: display-space z for a potential value, mapping
//!   `[-MAX, MAX]` to roughly `[-0.5, 0.5]`
//!
//! All conversions are affine and exact inverses of each other up to rounding.

use std::collections::{HashSet, VecDeque};

use common::{PlaneHit, Ray};
use glam::{DVec2, DVec3};

use crate::config::SimConfig;
use crate::constants::DISPLAY_Z_OFFSET;

/// `(i, j)` position in the grid; `i` runs along world x, `j` along world y.
pub type CellIndex = (usize, usize);

/// Inclusive, axis-aligned rectangle of grid indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRect {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl IndexRect {
    /// Rectangle spanned by two corners in any order.
    pub fn from_corners(a: CellIndex, b: CellIndex) -> Self {
        Self {
            x0: a.0.min(b.0),
            x1: a.0.max(b.0),
            y0: a.1.min(b.1),
            y1: a.1.max(b.1),
        }
    }

    pub fn single(cell: CellIndex) -> Self {
        Self::from_corners(cell, cell)
    }

    pub fn width(&self) -> usize {
        self.x1 - self.x0 + 1
    }

    pub fn height(&self) -> usize {
        self.y1 - self.y0 + 1
    }

    pub fn cell_count(&self) -> usize {
        self.width() * self.height()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &IndexRect) -> IndexRect {
        IndexRect {
            x0: self.x0.min(other.x0),
            x1: self.x1.max(other.x1),
            y0: self.y0.min(other.y0),
            y1: self.y1.max(other.y1),
        }
    }

    /// Grow to include a cell.
    pub fn include(&mut self, (i, j): CellIndex) {
        self.x0 = self.x0.min(i);
        self.x1 = self.x1.max(i);
        self.y0 = self.y0.min(j);
        self.y1 = self.y1.max(j);
    }

    /// Every cell in x-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellIndex> + '_ {
        (self.x0..=self.x1).flat_map(move |i| (self.y0..=self.y1).map(move |j| (i, j)))
    }
}

/// Stateless conversions for one grid configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridGeometry {
    samples_per_side: usize,
    side_length: f64,
    spacing: f64,
    max_potential: f64,
}

impl GridGeometry {
    pub fn new(config: &SimConfig) -> Self {
        Self {
            samples_per_side: config.samples_per_side,
            side_length: config.side_length,
            spacing: config.spacing(),
            max_potential: config.max_potential,
        }
    }

    pub fn samples_per_side(&self) -> usize {
        self.samples_per_side
    }

    /// Grid spacing `dR`
    pub fn spacing(&self) -> f64 {
        self.spacing
    }

    pub fn side_length(&self) -> f64 {
        self.side_length
    }

    pub fn half_side(&self) -> f64 {
        self.side_length / 2.0
    }

    pub fn max_potential(&self) -> f64 {
        self.max_potential
    }

    pub fn cell_count(&self) -> usize {
        self.samples_per_side * self.samples_per_side
    }

    pub fn last_index(&self) -> usize {
        self.samples_per_side - 1
    }

    /// Flattened storage offset (x-major).
    pub fn flat(&self, (i, j): CellIndex) -> usize {
        i * self.samples_per_side + j
    }

    pub fn unflatten(&self, index: usize) -> CellIndex {
        (index / self.samples_per_side, index % self.samples_per_side)
    }

    pub fn in_bounds(&self, i: i64, j: i64) -> bool {
        let n = self.samples_per_side as i64;
        i >= 0 && j >= 0 && i < n && j < n
    }

    /// Rectangle covering the whole grid.
    pub fn full_rect(&self) -> IndexRect {
        IndexRect::from_corners((0, 0), (self.last_index(), self.last_index()))
    }

    // ── index <-> world ────────────────────────────────────────────

    pub fn index_to_world(&self, index: usize) -> f64 {
        index as f64 * self.spacing - self.half_side()
    }

    /// Fractional index for a world coordinate (no rounding or clamping).
    pub fn world_to_index(&self, world: f64) -> f64 {
        (world + self.half_side()) / self.spacing
    }

    /// World position of a cell.
    pub fn cell_center(&self, (i, j): CellIndex) -> DVec2 {
        DVec2::new(self.index_to_world(i), self.index_to_world(j))
    }

    /// Whether a world point lies strictly inside the square.
    pub fn contains_world(&self, x: f64, y: f64) -> bool {
        let h = self.half_side();
        x > -h && x < h && y > -h && y < h
    }

    /// Nearest cell to an interior world point. Callers must check
    /// [`contains_world`](Self::contains_world) first; the result is clamped
    /// regardless.
    pub fn nearest_cell(&self, x: f64, y: f64) -> CellIndex {
        let last = self.last_index() as f64;
        let i = self.world_to_index(x).round_ties_even().clamp(0.0, last);
        let j = self.world_to_index(y).round_ties_even().clamp(0.0, last);
        (i as usize, j as usize)
    }

    // ── world <-> display ──────────────────────────────────────────

    pub fn world_to_display(&self, world: f64) -> f64 {
        world / self.half_side()
    }

    pub fn display_to_world(&self, display: f64) -> f64 {
        display * self.half_side()
    }

    pub fn display_to_world_vec(&self, display: DVec3) -> DVec3 {
        display * self.half_side()
    }

    pub fn index_to_display(&self, index: usize) -> f64 {
        index as f64 * (2.0 / (self.samples_per_side as f64 - 1.0)) - 1.0
    }

    // ── potential height ───────────────────────────────────────────

    /// Display-space z for a potential value.
    pub fn potential_to_display(&self, potential: f64) -> f64 {
        potential / (2.0 * self.max_potential) + DISPLAY_Z_OFFSET
    }

    pub fn display_to_potential(&self, display: f64) -> f64 {
        (display - DISPLAY_Z_OFFSET) * 2.0 * self.max_potential
    }

    /// World-space z for a potential value.
    pub fn potential_to_world(&self, potential: f64) -> f64 {
        self.display_to_world(self.potential_to_display(potential))
    }

    pub fn world_to_potential(&self, world: f64) -> f64 {
        self.display_to_potential(self.world_to_display(world))
    }

    // ── rays and index lookup ──────────────────────────────────────

    /// Intersect a ray with the plane `z = plane_z` (same coordinate system
    /// as the ray). Degenerate rays yield a large but finite point.
    pub fn intersect_ray_with_plane(&self, ray: &Ray, plane_z: f64) -> PlaneHit {
        let hit = ray.intersect_plane_z(plane_z);
        if hit.degenerate {
            log::debug!("ray nearly parallel to z = {plane_z}; using substitute denominator");
        }
        hit
    }

    /// Last index reachable when snapping to multiples of `spacing`.
    pub fn last_snapped_index(&self, spacing: usize) -> usize {
        let spacing = spacing.max(1);
        spacing * (self.last_index() / spacing)
    }

    /// Snap an index to the nearest multiple of `spacing`, clamped to the grid.
    pub fn snap_index(&self, index: usize, spacing: usize) -> usize {
        let spacing = spacing.max(1);
        let snapped = spacing as f64 * (index as f64 / spacing as f64).round_ties_even();
        (snapped as usize).min(self.last_snapped_index(spacing))
    }

    /// Closest grid index to a world point, snapped to multiples of `spacing`
    /// and clamped to `[0, spacing * floor((N-1)/spacing)]`.
    pub fn closest_index(&self, world: DVec2, spacing: usize) -> CellIndex {
        let spacing = spacing.max(1);
        let step = spacing as f64;
        let end = self.last_snapped_index(spacing) as f64;
        let snap = |w: f64| {
            let raw = step * ((w + self.half_side()) / (step * self.spacing)).round_ties_even();
            raw.clamp(0.0, end) as usize
        };
        (snap(world.x), snap(world.y))
    }

    /// Same as [`closest_index`](Self::closest_index) for a display point.
    pub fn closest_index_display(&self, display: DVec2, spacing: usize) -> CellIndex {
        self.closest_index(display * self.half_side(), spacing)
    }

    /// Breadth-first search from `seed` over 4-neighbours for the nearest cell
    /// whose rounded value equals `target`. Neighbours are admitted while
    /// `dx² + dy² < max_radius²` relative to the seed.
    pub fn closest_index_matching_value(
        &self,
        values: &[f64],
        seed: CellIndex,
        target: i64,
        max_radius: usize,
    ) -> Option<CellIndex> {
        let limit = (max_radius * max_radius) as i64;
        let mut visited = HashSet::from([seed]);
        let mut queue = VecDeque::from([seed]);

        while let Some(cell) = queue.pop_front() {
            if values[self.flat(cell)].round_ties_even() as i64 == target {
                return Some(cell);
            }
            let (ci, cj) = (cell.0 as i64, cell.1 as i64);
            for (ni, nj) in [(ci - 1, cj), (ci + 1, cj), (ci, cj - 1), (ci, cj + 1)] {
                if !self.in_bounds(ni, nj) {
                    continue;
                }
                let (dx, dy) = (ni - seed.0 as i64, nj - seed.1 as i64);
                if dx * dx + dy * dy >= limit {
                    continue;
                }
                let next = (ni as usize, nj as usize);
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        None
    }

    /// Closest index to where a display-space ray meets the z = 0 plane.
    pub fn closest_index_flat(&self, ray: &Ray, spacing: usize) -> CellIndex {
        let hit = self.intersect_ray_with_plane(ray, 0.0);
        self.closest_index_display(hit.point.truncate(), spacing)
    }
}
