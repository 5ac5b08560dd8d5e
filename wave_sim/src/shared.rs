//! Thread-shared handle around a [`Simulation`]
//!
//! One coarse lock guards integration, edits and snapshot reads. Hosts that
//! must never stall a render thread poll with [`SharedSimulation::try_snapshot`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use crate::clock::AdvanceOutcome;
use crate::simulation::Simulation;
use crate::snapshot::FrameSnapshot;

#[derive(Clone)]
pub struct SharedSimulation {
    inner: Arc<Mutex<Simulation>>,
}

impl SharedSimulation {
    pub fn new(simulation: Simulation) -> Self {
        Self {
            inner: Arc::new(Mutex::new(simulation)),
        }
    }

    /// The state is plain numeric data, so a panic mid-update leaves nothing
    /// that cannot be read or overwritten.
    fn lock(&self) -> MutexGuard<'_, Simulation> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Advance one frame at the configured sub-step count.
    pub fn advance_frame(&self) -> AdvanceOutcome {
        self.lock().advance_frame()
    }

    /// Run `f` with exclusive access, between frames.
    pub fn edit<R>(&self, f: impl FnOnce(&mut Simulation) -> R) -> R {
        f(&mut self.lock())
    }

    /// Copy the current state, waiting for an in-flight frame to finish.
    pub fn snapshot(&self) -> FrameSnapshot {
        self.lock().snapshot()
    }

    /// Copy the current state if nobody holds the lock.
    pub fn try_snapshot(&self) -> Option<FrameSnapshot> {
        match self.inner.try_lock() {
            Ok(mut sim) => Some(sim.snapshot()),
            Err(TryLockError::Poisoned(poisoned)) => Some(poisoned.into_inner().snapshot()),
            Err(TryLockError::WouldBlock) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use std::thread;

    #[test]
    fn frames_and_snapshots_from_two_threads() {
        let sim = Simulation::new(SimConfig {
            samples_per_side: 21,
            ..SimConfig::default()
        })
        .expect("valid config");
        let shared = SharedSimulation::new(sim);

        let worker = {
            let shared = shared.clone();
            thread::spawn(move || {
                for _ in 0..10 {
                    shared.advance_frame();
                }
            })
        };
        for _ in 0..10 {
            let _ = shared.try_snapshot();
        }
        worker.join().expect("worker finished");

        let snapshot = shared.snapshot();
        assert!((snapshot.elapsed - 0.01).abs() < 1e-9);
        assert!(shared.try_snapshot().is_some());
    }

    #[test]
    fn edit_runs_with_exclusive_access() {
        let sim = Simulation::new(SimConfig {
            samples_per_side: 21,
            ..SimConfig::default()
        })
        .expect("valid config");
        let shared = SharedSimulation::new(sim);
        let speed = shared.edit(|sim| {
            sim.set_packet_speed(2.0, false);
            sim.packet().current().speed
        });
        assert_eq!(speed, 2.0);
    }
}
