//! The editable potential grid
//!
//! [`PotentialField`] owns two copies of the potential: `v`, which the
//! integrators read, and `v_preview`, which hosts draw while an edit is in
//! progress. Both stay clamped to `±max_potential`.
//!
//! Two edit modes exist and only one is active at a time:
//! - **tile**: a rectangle is stretched out from an anchor cell and raised by
//!   the tile level. Nothing reaches `v` until [`confirm_edit`] is called.
//! - **brush**: a Gaussian dab is added to both copies immediately.
//!
//! Editing operations return the [`IndexRect`] they touched so the caller can
//! forward it as a dirty region.
//!
//! [`confirm_edit`]: PotentialField::confirm_edit

use std::collections::{HashSet, VecDeque};
use std::fmt;

use common::Ray;
use glam::{DVec2, DVec3};

use crate::config::SimConfig;
use crate::constants::{
    BRUSH_FACTOR, MAX_BRUSH_PRECISION, MIN_BRUSH_PRECISION, ROUND_TO_ZERO,
};
use crate::error::EquationError;
use crate::geometry::{CellIndex, GridGeometry, IndexRect};
use crate::source::{Flat, PotentialSource, SourceCheck};

/// Which edit is in progress, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMode {
    Tile,
    Brush,
}

/// Tile edit bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TileEdit {
    anchor: CellIndex,
    stretch: CellIndex,
    current: Option<IndexRect>,
    previous: Option<IndexRect>,
}

/// Brush settings derived from a height and a precision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BrushSettings {
    pub height: f64,
    pub precision: f64,
    /// Gaussian width
    pub spread: f64,
    /// Cells farther than this do not expand the search
    pub radius: f64,
    pub center: CellIndex,
}

impl BrushSettings {
    /// Derive spread and radius for a height and precision.
    ///
    /// `spread = factor·(max + min - precision)` and
    /// `radius = spread·sqrt(-ln(ROUND_TO_ZERO / |height|))`, so the dab has
    /// decayed to [`ROUND_TO_ZERO`] at the radius. Heights too small to ever
    /// exceed that threshold get a zero radius.
    pub fn new(height: f64, precision: f64, center: CellIndex) -> Self {
        let precision = precision.clamp(MIN_BRUSH_PRECISION, MAX_BRUSH_PRECISION);
        let spread = BRUSH_FACTOR * (MAX_BRUSH_PRECISION + MIN_BRUSH_PRECISION - precision);
        let radius = if height.abs() <= ROUND_TO_ZERO {
            0.0
        } else {
            spread * (-(ROUND_TO_ZERO / height.abs()).ln()).sqrt()
        };
        Self {
            height,
            precision,
            spread,
            radius,
            center,
        }
    }
}

/// Spread that makes a dab of `height` decay to [`ROUND_TO_ZERO`] at `radius`.
pub fn spread_for_radius(radius: f64, height: f64) -> f64 {
    if height.abs() <= ROUND_TO_ZERO {
        return radius;
    }
    radius / (height.abs() / ROUND_TO_ZERO).ln().sqrt()
}

/// Candidate closest to `origin`.
fn nearest_to<'a, I>(pool: I, origin: DVec3) -> Option<CellIndex>
where
    I: IntoIterator<Item = &'a (CellIndex, DVec3)>,
{
    pool.into_iter()
        .min_by(|a, b| {
            a.1.distance_squared(origin)
                .total_cmp(&b.1.distance_squared(origin))
        })
        .map(|(cell, _)| *cell)
}

/// A constant-valued block found by [`PotentialField::find_covering_rectangles`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoveringRect {
    pub rect: IndexRect,
    pub value: f64,
}

pub struct PotentialField {
    geometry: GridGeometry,
    boundary_potential: f64,
    placement_spacing: usize,
    proximity_radius: usize,
    picking_levels: usize,
    v: Vec<f64>,
    v_preview: Vec<f64>,
    covered: Vec<bool>,
    source: Box<dyn PotentialSource>,
    mode: Option<EditMode>,
    tile: Option<TileEdit>,
    tile_level: f64,
    brush: BrushSettings,
}

impl fmt::Debug for PotentialField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PotentialField")
            .field("samples_per_side", &self.geometry.samples_per_side())
            .field("source", &self.source.label())
            .field("mode", &self.mode)
            .field("tile_level", &self.tile_level)
            .field("brush", &self.brush)
            .finish()
    }
}

impl PotentialField {
    /// Flat zero potential.
    pub fn new(config: &SimConfig) -> Self {
        let geometry = GridGeometry::new(config);
        let cells = geometry.cell_count();
        let center = geometry.nearest_cell(0.0, 0.0);
        Self {
            geometry,
            boundary_potential: config.boundary_potential,
            placement_spacing: config.placement_spacing.max(1),
            proximity_radius: config.proximity_radius,
            picking_levels: config.picking_levels(),
            v: vec![0.0; cells],
            v_preview: vec![0.0; cells],
            covered: vec![false; cells],
            source: Box::new(Flat(0.0)),
            mode: None,
            tile: None,
            tile_level: Self::default_tile_level(config.max_potential),
            brush: BrushSettings::new(1.0, MAX_BRUSH_PRECISION, center),
        }
    }

    fn default_tile_level(max_potential: f64) -> f64 {
        0.2 * max_potential
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Confirmed potential, x-major.
    pub fn values(&self) -> &[f64] {
        &self.v
    }

    /// Potential including any in-progress edit.
    pub fn preview_values(&self) -> &[f64] {
        &self.v_preview
    }

    pub fn covered(&self) -> &[bool] {
        &self.covered
    }

    pub fn value(&self, cell: CellIndex) -> f64 {
        self.v[self.geometry.flat(cell)]
    }

    pub fn preview_value(&self, cell: CellIndex) -> f64 {
        self.v_preview[self.geometry.flat(cell)]
    }

    pub fn source_label(&self) -> String {
        self.source.label()
    }

    pub fn edit_mode(&self) -> Option<EditMode> {
        self.mode
    }

    pub fn tile_level(&self) -> f64 {
        self.tile_level
    }

    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    /// Whether `v` and `v_preview` differ anywhere.
    pub fn has_pending_preview(&self) -> bool {
        self.v != self.v_preview
    }

    fn clip(&self, value: f64) -> f64 {
        let max = self.geometry.max_potential();
        value.clamp(-max, max)
    }

    // ── sources ────────────────────────────────────────────────────

    /// Replace the whole grid with values from `source`.
    ///
    /// On error nothing changes. A clipped result is installed and reported
    /// as [`SourceCheck::Clipped`].
    pub fn set_source(
        &mut self,
        source: Box<dyn PotentialSource>,
    ) -> Result<SourceCheck, EquationError> {
        let check = match source.check_errors(&self.geometry) {
            Ok(check) => check,
            Err(e) => {
                log::warn!("rejected potential {:?}: {e}", source.label());
                return Err(e);
            }
        };
        if check == SourceCheck::Clipped {
            log::warn!(
                "potential {:?} exceeds ±{} and was clipped",
                source.label(),
                self.geometry.max_potential()
            );
        }

        let n = self.geometry.samples_per_side();
        for i in 0..n {
            let x = self.geometry.index_to_world(i);
            for j in 0..n {
                let value = self.clip(source.evaluate(x, self.geometry.index_to_world(j)));
                let k = i * n + j;
                self.v[k] = value;
                self.v_preview[k] = value;
            }
        }
        self.source = source;
        self.mode = None;
        self.tile = None;
        log::info!("installed potential {:?}", self.source.label());
        Ok(check)
    }

    /// Reset to a flat zero potential.
    pub fn clear(&mut self) {
        self.v.fill(0.0);
        self.v_preview.fill(0.0);
        self.covered.fill(false);
        self.source = Box::new(Flat(0.0));
        self.mode = None;
        self.tile = None;
    }

    // ── point queries ──────────────────────────────────────────────

    /// Potential at a world point.
    ///
    /// Points on or beyond the square's edge report the boundary potential.
    /// With `discretized` the nearest cell's value is returned; otherwise the
    /// source is re-evaluated and used when it agrees with the stored value
    /// to within 1.0, so edits made on top of the source still win.
    pub fn value_at(&self, x: f64, y: f64, discretized: bool) -> f64 {
        if !self.geometry.contains_world(x, y) {
            return self.boundary_potential;
        }
        let stored = self.v[self.geometry.flat(self.geometry.nearest_cell(x, y))];
        if discretized {
            return stored;
        }
        let evaluated = self.source.evaluate(x, y);
        if !evaluated.is_finite() || (evaluated - stored).abs() >= 1.0 {
            stored
        } else {
            evaluated
        }
    }

    /// Nearest cell at or around `seed` whose rounded potential is `target`.
    pub fn search_proximity(
        &self,
        seed: CellIndex,
        target: i64,
        max_radius: usize,
    ) -> Option<CellIndex> {
        self.geometry
            .closest_index_matching_value(&self.v, seed, target, max_radius)
    }

    /// Pick the grid cell a display-space ray hits on the potential surface.
    ///
    /// Every integer level is intersected with the ray and searched for a
    /// nearby cell at that level. Among the candidates, the one nearest the
    /// ray origin within a growing distance-to-ray threshold wins; without
    /// any candidates the ray is dropped onto the flat ground plane.
    pub fn closest_index_on_surface(&self, ray: &Ray, spacing: usize) -> CellIndex {
        let g = &self.geometry;
        let levels = (self.picking_levels / 2) as i64;
        let half = g.half_side();

        let mut candidates: Vec<CellIndex> = Vec::new();
        for level in -levels..=levels {
            let hit = g.intersect_ray_with_plane(ray, g.potential_to_display(level as f64));
            let x = g.display_to_world(hit.point.x).clamp(-half, half);
            let y = g.display_to_world(hit.point.y).clamp(-half, half);
            let seed = g.nearest_cell(x, y);
            if let Some(cell) = self.search_proximity(seed, level, self.proximity_radius) {
                candidates.push(cell);
            }
        }

        if candidates.is_empty() {
            log::debug!("no surface candidates; falling back to ground plane");
            return g.closest_index_flat(ray, spacing);
        }

        let world_ray = Ray::new(
            g.display_to_world_vec(ray.origin),
            g.display_to_world_vec(ray.direction).normalize_or_zero(),
        );
        let points: Vec<(CellIndex, DVec3)> = candidates
            .into_iter()
            .map(|cell| {
                let xy = g.cell_center(cell);
                (cell, DVec3::new(xy.x, xy.y, g.potential_to_world(self.value(cell))))
            })
            .collect();

        let mut chosen = None;
        for k in 1..=self.proximity_radius.max(1) {
            let threshold = k as f64 * g.spacing();
            let within = points
                .iter()
                .filter(|(_, p)| world_ray.distance_to_line(*p) <= threshold);
            if let Some(cell) = nearest_to(within, world_ray.origin) {
                chosen = Some(cell);
                break;
            }
        }
        let cell = match chosen {
            Some(cell) => cell,
            None => {
                log::debug!("no candidate near the ray; using nearest overall");
                match nearest_to(points.iter(), world_ray.origin) {
                    Some(cell) => cell,
                    None => return g.closest_index_flat(ray, spacing),
                }
            }
        };

        (g.snap_index(cell.0, spacing), g.snap_index(cell.1, spacing))
    }

    // ── tile edits ─────────────────────────────────────────────────

    /// Start a tile edit at the cell under `ray` and preview it at the
    /// default level.
    pub fn begin_tile_edit(&mut self, ray: &Ray) -> IndexRect {
        self.cancel_edit();
        self.tile_level = Self::default_tile_level(self.geometry.max_potential());
        let p = self.placement_spacing;
        let last = self.geometry.last_index();
        let picked = self.closest_index_on_surface(ray, p);
        let pull = |v: usize| if v >= last { v.saturating_sub(p - 1) } else { v };
        let block = (pull(picked.0), pull(picked.1));

        self.mode = Some(EditMode::Tile);
        self.tile = Some(TileEdit {
            anchor: block,
            stretch: block,
            current: None,
            previous: None,
        });
        log::debug!("tile edit started at {block:?}");
        self.preview_tile()
    }

    /// Move the stretch corner of the active tile edit to the cell under `ray`.
    ///
    /// Returns `None` when no tile edit is in progress.
    pub fn update_tile_stretch(&mut self, ray: &Ray) -> Option<IndexRect> {
        self.tile?;
        self.tile_level = Self::default_tile_level(self.geometry.max_potential());
        let p = self.placement_spacing;
        let last = self.geometry.last_index();
        let picked = self.closest_index_on_surface(ray, p);
        let pull = |v: usize| if v >= last { v.saturating_sub(p) } else { v };
        if let Some(tile) = self.tile.as_mut() {
            tile.stretch = (pull(picked.0), pull(picked.1));
        }
        Some(self.preview_tile())
    }

    /// Set the tile level from a normalized stretch value:
    /// `0.2·MAX + stretch·4·MAX`, clipped.
    pub fn set_tile_level_from_stretch(&mut self, stretch: f64) -> Option<IndexRect> {
        let max = self.geometry.max_potential();
        self.tile_level = self.clip(0.2 * max + stretch * 4.0 * max);
        self.tile?;
        Some(self.preview_tile())
    }

    /// Expand raw anchor/stretch blocks into a rectangle covering whole
    /// placement blocks.
    fn refine(&self, anchor: CellIndex, stretch: CellIndex) -> IndexRect {
        let p = self.placement_spacing;
        let last = self.geometry.last_index();
        let widen = |a: usize, s: usize| -> (usize, usize) {
            let reach = |v: usize| if v + 2 * p - 1 <= last { v + p - 1 } else { last };
            if a > s {
                (reach(a), s)
            } else {
                (a, reach(s))
            }
        };
        let (ax, sx) = widen(anchor.0, stretch.0);
        let (ay, sy) = widen(anchor.1, stretch.1);
        IndexRect::from_corners((ax, ay), (sx, sy))
    }

    /// Resync the previous rectangle and raise the current one in the preview.
    fn preview_tile(&mut self) -> IndexRect {
        let Some(tile) = self.tile else {
            return IndexRect::single((0, 0));
        };
        let rect = self.refine(tile.anchor, tile.stretch);
        let previous = tile.current;

        if let Some(prev) = previous {
            self.resync(prev);
        }
        for cell in rect.cells() {
            let k = self.geometry.flat(cell);
            self.v_preview[k] = self.clip(self.v[k] + self.tile_level);
        }
        if let Some(t) = self.tile.as_mut() {
            t.previous = previous;
            t.current = Some(rect);
        }
        previous.map_or(rect, |prev| prev.union(&rect))
    }

    /// Copy `v` into `v_preview` over `rect`.
    fn resync(&mut self, rect: IndexRect) {
        for cell in rect.cells() {
            let k = self.geometry.flat(cell);
            self.v_preview[k] = self.v[k];
        }
    }

    /// Commit the in-progress edit.
    ///
    /// Tile edits raise `v` over the current rectangle; brush edits are
    /// already committed. Returns the rectangle written, if any.
    pub fn confirm_edit(&mut self) -> Option<IndexRect> {
        let mode = self.mode.take();
        let tile = self.tile.take();
        match (mode, tile) {
            (Some(EditMode::Tile), Some(TileEdit { current: Some(rect), previous, .. })) => {
                for cell in rect.cells() {
                    let k = self.geometry.flat(cell);
                    self.v[k] = self.clip(self.v[k] + self.tile_level);
                }
                if let Some(prev) = previous {
                    self.resync(prev);
                }
                self.resync(rect);
                self.tile_level = Self::default_tile_level(self.geometry.max_potential());
                log::debug!("tile edit confirmed over {rect:?}");
                Some(previous.map_or(rect, |prev| prev.union(&rect)))
            }
            _ => None,
        }
    }

    /// Drop the in-progress edit, reverting the preview to `v`.
    pub fn cancel_edit(&mut self) -> Option<IndexRect> {
        self.mode = None;
        let tile = self.tile.take()?;
        let mut touched: Option<IndexRect> = None;
        for rect in [tile.current, tile.previous].into_iter().flatten() {
            self.resync(rect);
            touched = Some(touched.map_or(rect, |t| t.union(&rect)));
        }
        log::debug!("edit cancelled");
        touched
    }

    // ── brush edits ────────────────────────────────────────────────

    /// Update brush height and precision; the center is kept.
    pub fn set_brush_params(&mut self, height: f64, precision: f64) {
        self.brush = BrushSettings::new(height, precision, self.brush.center);
    }

    /// Move the brush to the cell under `ray`.
    pub fn set_brush_center(&mut self, ray: &Ray) -> CellIndex {
        self.brush.center = self.closest_index_on_surface(ray, 1);
        self.brush.center
    }

    /// Start brush mode and apply one dab under `ray`.
    pub fn begin_brush_edit(&mut self, ray: &Ray) -> IndexRect {
        self.cancel_edit();
        self.mode = Some(EditMode::Brush);
        self.update_brush_edit(ray)
    }

    /// Move the brush and apply one dab.
    pub fn update_brush_edit(&mut self, ray: &Ray) -> IndexRect {
        self.set_brush_center(ray);
        self.apply_brush()
    }

    /// Apply one dab at the current brush center with the current settings.
    pub fn apply_brush(&mut self) -> IndexRect {
        let BrushSettings {
            height,
            spread,
            radius,
            center,
            ..
        } = self.brush;
        self.paint_cells(center, self.geometry.cell_center(center), spread, radius, height)
    }

    /// Add a Gaussian dab of `height` centered on a world point.
    ///
    /// The falloff width is chosen so the dab decays to [`ROUND_TO_ZERO`] at
    /// `radius`. Both `v` and `v_preview` are updated.
    pub fn paint_brush(&mut self, center: DVec2, radius: f64, height: f64) -> IndexRect {
        let spread = spread_for_radius(radius, height);
        let seed = self.geometry.nearest_cell(center.x, center.y);
        self.paint_cells(seed, center, spread, radius, height)
    }

    fn paint_cells(
        &mut self,
        seed: CellIndex,
        center: DVec2,
        spread: f64,
        radius: f64,
        height: f64,
    ) -> IndexRect {
        let g = self.geometry;
        let mut visited = HashSet::from([seed]);
        let mut queue = VecDeque::from([seed]);
        let mut touched = IndexRect::single(seed);
        let spread2 = (spread * spread).max(f64::MIN_POSITIVE);

        while let Some(cell) = queue.pop_front() {
            let k = g.flat(cell);
            let d2 = g.cell_center(cell).distance_squared(center);
            let value = self.clip(self.v[k] + height * (-d2 / spread2).exp());
            self.v[k] = value;
            self.v_preview[k] = value;
            touched.include(cell);

            if d2.sqrt() > radius {
                continue;
            }
            let (ci, cj) = (cell.0 as i64, cell.1 as i64);
            for (ni, nj) in [(ci - 1, cj), (ci + 1, cj), (ci, cj - 1), (ci, cj + 1)] {
                if !g.in_bounds(ni, nj) {
                    continue;
                }
                let next = (ni as usize, nj as usize);
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        touched
    }

    // ── legacy rectangle cover ─────────────────────────────────────

    /// Greedy decomposition of non-zero regions into constant-value blocks.
    ///
    /// Scans rows in order, extends each block along x while values match,
    /// then along y while the whole row segment matches. Marks the cells it
    /// uses as covered.
    pub fn find_covering_rectangles(&mut self, preview: bool) -> Vec<CoveringRect> {
        let g = self.geometry;
        let n = g.samples_per_side();
        self.covered.fill(false);
        let values = if preview { &self.v_preview } else { &self.v };
        let mut found = Vec::new();

        for j in 0..n {
            for i in 0..n {
                let k = g.flat((i, j));
                let value = values[k];
                if self.covered[k] || value == 0.0 {
                    continue;
                }

                let mut x1 = i;
                while x1 + 1 < n {
                    let next = g.flat((x1 + 1, j));
                    if self.covered[next] || values[next] != value {
                        break;
                    }
                    x1 += 1;
                }

                let mut y1 = j;
                'grow: while y1 + 1 < n {
                    for x in i..=x1 {
                        let next = g.flat((x, y1 + 1));
                        if self.covered[next] || values[next] != value {
                            break 'grow;
                        }
                    }
                    y1 += 1;
                }

                let rect = IndexRect::from_corners((i, j), (x1, y1));
                for cell in rect.cells() {
                    self.covered[g.flat(cell)] = true;
                }
                found.push(CoveringRect { rect, value });
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Barrier;

    fn config() -> SimConfig {
        SimConfig {
            samples_per_side: 39,
            ..SimConfig::default()
        }
    }

    /// Straight-down ray over a world point, in display coordinates.
    fn ray_over(field: &PotentialField, x: f64, y: f64) -> Ray {
        let g = field.geometry();
        Ray::new(
            DVec3::new(g.world_to_display(x), g.world_to_display(y), 2.0),
            DVec3::new(0.0, 0.0, -1.0),
        )
    }

    #[test]
    fn value_at_outside_square_is_boundary() {
        let field = PotentialField::new(&config());
        for discretized in [true, false] {
            assert_eq!(field.value_at(7.5, 0.0, discretized), 100.0);
            assert_eq!(field.value_at(0.0, -9.0, discretized), 100.0);
            assert_eq!(field.value_at(0.0, 0.0, discretized), 0.0);
        }
    }

    #[test]
    fn smooth_lookup_prefers_source_but_keeps_edits() {
        let mut field = PotentialField::new(&config());
        let hill = Barrier::Gaussian {
            height: 10.0,
            center: DVec2::ZERO,
            sigma: 2.0,
        };
        assert_eq!(field.set_source(Box::new(hill)), Ok(SourceCheck::Clean));
        let smooth = field.value_at(0.05, 0.0, false);
        assert!((smooth - hill.evaluate(0.05, 0.0)).abs() < 1e-12);

        field.paint_brush(DVec2::ZERO, 1.0, 5.0);
        assert_eq!(field.value_at(0.0, 0.0, false), field.value_at(0.0, 0.0, true));
    }

    #[test]
    fn rejected_source_leaves_grid_untouched() {
        let mut field = PotentialField::new(&config());
        field.paint_brush(DVec2::ZERO, 1.0, 5.0);
        let before = field.values().to_vec();
        let bad = crate::source::FnSource::new("", |_, _| 1.0);
        assert_eq!(field.set_source(Box::new(bad)), Err(EquationError::Empty));
        assert_eq!(field.values(), before.as_slice());
    }

    #[test]
    fn clipped_source_is_installed() {
        let mut field = PotentialField::new(&config());
        assert_eq!(field.set_source(Box::new(Flat(45.0))), Ok(SourceCheck::Clipped));
        assert!(field.values().iter().all(|&v| v == 30.0));
    }

    #[test]
    fn brush_peaks_at_center() {
        let mut field = PotentialField::new(&config());
        field.paint_brush(DVec2::ZERO, 1.0, 5.0);
        let g = *field.geometry();
        let center = field.value_at(0.0, 0.0, true);
        let far = field.value(g.nearest_cell(2.0, 0.0));
        assert!((center - 5.0).abs() < (far - 5.0).abs());
        assert!(far.abs() < 1e-2);
        assert_eq!(field.values(), field.preview_values());
    }

    #[test]
    fn brush_settings_decay_at_radius() {
        let brush = BrushSettings::new(4.0, 10.0, (0, 0));
        assert!((brush.spread - 0.15 * 15.5).abs() < 1e-12);
        let at_radius = 4.0 * (-(brush.radius / brush.spread).powi(2)).exp();
        assert!((at_radius - ROUND_TO_ZERO).abs() < 1e-9);
        assert_eq!(BrushSettings::new(0.0005, 10.0, (0, 0)).radius, 0.0);
    }

    #[test]
    fn tile_preview_confirm_and_cancel() {
        let mut field = PotentialField::new(&config());
        let level = field.tile_level();
        assert_eq!(level, 6.0);

        let start = field.begin_tile_edit(&ray_over(&field, 0.0, 0.0));
        assert!(start.cell_count() >= 9);
        assert!(field.values().iter().all(|&v| v == 0.0));
        let stretched = field
            .update_tile_stretch(&ray_over(&field, 2.0, 2.0))
            .expect("tile edit active");
        assert!(stretched.cell_count() > start.cell_count());
        assert!(field.has_pending_preview());

        let cancelled = field.cancel_edit();
        assert!(cancelled.is_some());
        assert!(!field.has_pending_preview());

        field.begin_tile_edit(&ray_over(&field, 0.0, 0.0));
        let written = field.confirm_edit().expect("tile confirmed");
        assert!(written.cells().all(|c| field.value(c) == level));
        assert!(!field.has_pending_preview());
        assert_eq!(field.edit_mode(), None);
    }

    #[test]
    fn shrinking_tile_restores_preview() {
        let mut field = PotentialField::new(&config());
        field.begin_tile_edit(&ray_over(&field, -3.0, -3.0));
        field.update_tile_stretch(&ray_over(&field, 3.0, 3.0));
        let small = field
            .update_tile_stretch(&ray_over(&field, -3.0, -3.0))
            .expect("tile edit active");
        let raised = field
            .preview_values()
            .iter()
            .filter(|&&v| v != 0.0)
            .count();
        let current = field.refine(
            field.tile.map(|t| t.anchor).unwrap_or_default(),
            field.tile.map(|t| t.stretch).unwrap_or_default(),
        );
        assert_eq!(raised, current.cell_count());
        assert!(small.cell_count() > current.cell_count());
    }

    #[test]
    fn tile_level_follows_stretch() {
        let mut field = PotentialField::new(&config());
        assert_eq!(field.set_tile_level_from_stretch(0.1), None);
        assert!((field.tile_level() - 18.0).abs() < 1e-12);
        field.set_tile_level_from_stretch(1.0);
        assert_eq!(field.tile_level(), 30.0);
    }

    #[test]
    fn tile_level_resets_for_each_tile() {
        let mut field = PotentialField::new(&config());
        field.begin_tile_edit(&ray_over(&field, -3.0, -3.0));
        field.set_tile_level_from_stretch(1.0);
        let written = field.confirm_edit().expect("tile confirmed");
        assert!(written.cells().all(|c| field.value(c) == 30.0));
        assert_eq!(field.tile_level(), 6.0);

        let next = field.begin_tile_edit(&ray_over(&field, 3.0, 3.0));
        assert!(next.cells().all(|c| field.preview_value(c) == 6.0));

        field.set_tile_level_from_stretch(0.5);
        let stretched = field
            .update_tile_stretch(&ray_over(&field, 4.0, 4.0))
            .expect("tile edit active");
        assert_eq!(field.tile_level(), 6.0);
        assert!(stretched.cells().all(|c| field.preview_value(c) == 0.0 || field.preview_value(c) == 6.0));
    }

    #[test]
    fn surface_pick_finds_raised_block() {
        let mut field = PotentialField::new(&config());
        field
            .set_source(Box::new(Barrier::Rectangular {
                height: 20.0,
                center: DVec2::new(3.0, 0.0),
                half_extent: DVec2::splat(1.0),
            }))
            .expect("valid barrier");
        // Looking straight down onto the block
        let picked = field.closest_index_on_surface(&ray_over(&field, 3.0, 0.0), 1);
        assert_eq!(field.value(picked), 20.0);
    }

    #[test]
    fn surface_pick_sweeps_configured_levels() {
        let config = SimConfig {
            max_potential: 12.5,
            ..config()
        };
        assert_eq!(config.picking_levels(), 25);
        let mut field = PotentialField::new(&config);
        field
            .set_source(Box::new(Barrier::Rectangular {
                height: 12.0,
                center: DVec2::new(-3.0, 2.0),
                half_extent: DVec2::splat(1.0),
            }))
            .expect("valid barrier");
        let picked = field.closest_index_on_surface(&ray_over(&field, -3.0, 2.0), 1);
        assert_eq!(field.value(picked), 12.0);
    }

    #[test]
    fn covering_rectangles_partition_nonzero_cells() {
        let mut field = PotentialField::new(&config());
        field
            .set_source(Box::new(Barrier::Rectangular {
                height: 8.0,
                center: DVec2::ZERO,
                half_extent: DVec2::new(2.0, 1.0),
            }))
            .expect("valid barrier");
        let rects = field.find_covering_rectangles(false);
        assert_eq!(rects.len(), 1);
        assert_eq!(rects[0].value, 8.0);
        let nonzero = field.values().iter().filter(|&&v| v != 0.0).count();
        assert_eq!(rects[0].rect.cell_count(), nonzero);
        assert_eq!(field.covered().iter().filter(|&&c| c).count(), nonzero);
    }
}
