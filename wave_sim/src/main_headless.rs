//! Headless Wavepacket Runner
//!
//! Runs a preset without a window, reporting probability and the classical
//! particle while a second thread polls snapshots the way a renderer would.
//!
//! Usage: `wave_sim_headless [tutorial|free|hill] [frames]`

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use wave_sim::constants::OBSERVE_PRECISION;
use wave_sim::{SharedSimulation, SimConfig, SimError, Simulation};

const DEFAULT_FRAMES: usize = 2_000;
const REPORT_EVERY: usize = 250;

fn build(preset: &str, config: SimConfig) -> Result<Simulation, SimError> {
    match preset {
        "free" => Simulation::preset_free_packet(config),
        "hill" => Simulation::preset_gaussian_hill(config),
        _ => Simulation::preset_tutorial_wall(config),
    }
}

fn main() {
    common::init_logging();

    let mut args = std::env::args().skip(1);
    let preset = args.next().unwrap_or_else(|| "tutorial".to_string());
    let frames = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_FRAMES);

    println!("Wavepacket Sandbox (headless)");
    println!("=============================");
    println!("preset: {preset}, frames: {frames}\n");

    let config = SimConfig {
        samples_per_side: 99,
        time_step: 0.002,
        ..SimConfig::default()
    };
    let simulation = match build(&preset, config) {
        Ok(sim) => sim,
        Err(e) => {
            log::error!("failed to build preset {preset:?}: {e}");
            std::process::exit(1);
        }
    };
    let shared = SharedSimulation::new(simulation);

    let running = Arc::new(AtomicBool::new(true));
    let poller = {
        let shared = shared.clone();
        let running = Arc::clone(&running);
        thread::spawn(move || {
            let mut polled = 0usize;
            let mut missed = 0usize;
            while running.load(Ordering::Relaxed) {
                match shared.try_snapshot() {
                    Some(snapshot) => {
                        polled += 1;
                        let _ = snapshot.vertex_bytes();
                    }
                    None => missed += 1,
                }
                thread::sleep(Duration::from_millis(5));
            }
            (polled, missed)
        })
    };

    for frame in 1..=frames {
        let outcome = shared.advance_frame();
        if frame % REPORT_EVERY == 0 || outcome.finished() {
            shared.edit(|sim| {
                let p = sim.particle().position;
                println!(
                    "t = {:8.3}  P = {:.6}  particle = ({:+.3}, {:+.3})",
                    outcome.elapsed,
                    sim.total_probability(),
                    p.x,
                    p.y
                );
            });
        }
        if outcome.finished() {
            break;
        }
    }

    if let Some(m) = shared.edit(|sim| sim.observe(OBSERVE_PRECISION)) {
        println!(
            "\nobserved at ({:+.3}, {:+.3}), cell {:?}",
            m.position.x, m.position.y, m.cell
        );
    }

    running.store(false, Ordering::Relaxed);
    match poller.join() {
        Ok((polled, missed)) => log::info!("renderer thread: {polled} snapshots, {missed} busy polls"),
        Err(_) => log::warn!("snapshot poller panicked"),
    }
}
