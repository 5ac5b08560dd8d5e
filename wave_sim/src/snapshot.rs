//! Read-only views handed to hosts
//!
//! A [`FrameSnapshot`] is a full copy taken under the simulation lock, so
//! the host can draw from it while the next frame integrates. Changes since
//! the last snapshot are described by [`DirtyRegion`]s, either drained from
//! the snapshot or pushed to a [`SimObserver`].

use bytemuck::{Pod, Zeroable};

use crate::classical::ClassicalParticle;
use crate::geometry::{GridGeometry, IndexRect};
use crate::wavefunction::Packet;

/// What part of the state changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// Confirmed potential `V`
    Potential,
    /// Preview potential only
    PreviewPotential,
    Wavefunction,
    Particle,
    Packet,
}

/// A changed region of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirtyRegion {
    pub kind: ChangeKind,
    pub rect: IndexRect,
}

impl DirtyRegion {
    pub fn new(kind: ChangeKind, rect: IndexRect) -> Self {
        Self { kind, rect }
    }
}

/// Receives every dirty region as it is recorded.
pub trait SimObserver: Send {
    fn on_change(&mut self, region: &DirtyRegion);
}

/// Accumulates dirty regions, merging repeats of the same kind.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    regions: Vec<DirtyRegion>,
}

impl DirtyTracker {
    pub fn record(&mut self, region: DirtyRegion) {
        match self.regions.iter_mut().find(|r| r.kind == region.kind) {
            Some(existing) => existing.rect = existing.rect.union(&region.rect),
            None => self.regions.push(region),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn take(&mut self) -> Vec<DirtyRegion> {
        std::mem::take(&mut self.regions)
    }
}

/// One grid cell packed for direct upload to a vertex buffer.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct CellVertex {
    /// Display-space x, y and potential height
    pub position: [f32; 3],
    pub density: f32,
    pub phase: f32,
    pub potential: f32,
}

/// Full copy of the host-visible state.
#[derive(Debug, Clone)]
pub struct FrameSnapshot {
    pub geometry: GridGeometry,
    pub re: Vec<f64>,
    pub im: Vec<f64>,
    pub potential: Vec<f64>,
    pub preview_potential: Vec<f64>,
    pub particle: ClassicalParticle,
    pub packet: Packet,
    pub elapsed: f64,
    pub remaining: f64,
    /// Regions changed since the previous snapshot
    pub dirty: Vec<DirtyRegion>,
}

impl FrameSnapshot {
    pub fn density(&self, index: usize) -> f64 {
        self.re[index] * self.re[index] + self.im[index] * self.im[index]
    }

    /// Pack every cell, drawing the preview potential as the surface.
    pub fn cell_vertices(&self) -> Vec<CellVertex> {
        let g = &self.geometry;
        (0..g.cell_count())
            .map(|k| {
                let (i, j) = g.unflatten(k);
                let potential = self.preview_potential[k];
                CellVertex {
                    position: [
                        g.index_to_display(i) as f32,
                        g.index_to_display(j) as f32,
                        g.potential_to_display(potential) as f32,
                    ],
                    density: self.density(k) as f32,
                    phase: self.im[k].atan2(self.re[k]) as f32,
                    potential: potential as f32,
                }
            })
            .collect()
    }

    /// Raw bytes of [`cell_vertices`](Self::cell_vertices).
    pub fn vertex_bytes(&self) -> Vec<u8> {
        bytemuck::cast_slice(&self.cell_vertices()).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_merges_same_kind() {
        let mut tracker = DirtyTracker::default();
        tracker.record(DirtyRegion::new(ChangeKind::Potential, IndexRect::single((1, 1))));
        tracker.record(DirtyRegion::new(ChangeKind::Potential, IndexRect::single((4, 2))));
        tracker.record(DirtyRegion::new(ChangeKind::Particle, IndexRect::single((0, 0))));
        let regions = tracker.take();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].rect, IndexRect::from_corners((1, 1), (4, 2)));
        assert!(tracker.is_empty());
    }

    #[test]
    fn cell_vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<CellVertex>(), 24);
    }
}
