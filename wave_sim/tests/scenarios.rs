//! End-to-end scenarios on a small grid

use common::PickingCamera;
use glam::DVec2;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

use wave_sim::geometry::GridGeometry;
use wave_sim::potential::PotentialField;
use wave_sim::potential::EditMode;
use wave_sim::wave::{Integrator, Stencil};
use wave_sim::wavefunction::Packet;
use wave_sim::{SimConfig, Simulation};

fn small_config() -> SimConfig {
    SimConfig {
        samples_per_side: 39,
        side_length: 15.0,
        time_step: 0.001,
        ..SimConfig::default()
    }
}

fn resting_packet() -> Packet {
    Packet::new(DVec2::ZERO, 0.0, 0.0, 1.0)
}

#[test]
fn initial_packet_is_normalized() {
    let sim = Simulation::with_packet(small_config(), resting_packet()).expect("valid config");
    let total = sim.sum_probability(0, 38, 0, 38).expect("in bounds");
    assert!((total - 1.0).abs() < 1e-3, "total probability {total}");
}

#[test]
fn probability_is_conserved_on_flat_potential() {
    for stencil in [Stencil::FourthOrder, Stencil::SixthOrder] {
        let config = SimConfig {
            stencil,
            ..small_config()
        };
        let mut sim = Simulation::with_packet(config, resting_packet()).expect("valid config");
        let before = sim.total_probability();
        for _ in 0..1000 {
            sim.advance(1);
        }
        let after = sim.total_probability();
        assert!(
            (after - before).abs() / before < 0.01,
            "{stencil:?}: {before} -> {after}"
        );
        assert!((sim.elapsed() - 1.0).abs() < 1e-9);
    }
}

#[test]
fn moving_packet_and_particle_travel_together() {
    let config = SimConfig {
        integrator: Integrator::Pefrl,
        ..small_config()
    };
    let packet = Packet::new(DVec2::new(-2.0, 0.0), 0.0, 2.0, 1.0);
    let mut sim = Simulation::with_packet(config, packet).expect("valid config");
    for _ in 0..500 {
        sim.advance(1);
    }

    // Expected position of |ψ|² along x
    let g = *sim.geometry();
    let wave = sim.wave();
    let (mut weighted, mut total) = (0.0, 0.0);
    for k in 0..g.cell_count() {
        let (i, _) = g.unflatten(k);
        let density = wave.re[k] * wave.re[k] + wave.im[k] * wave.im[k];
        weighted += density * g.index_to_world(i);
        total += density;
    }
    let mean_x = weighted / total;

    let particle = sim.particle().position;
    assert!((particle.x + 1.0).abs() < 1e-6);
    assert!((mean_x - particle.x).abs() < 0.15, "wave at {mean_x}, particle at {}", particle.x);
}

#[test]
fn brush_center_outweighs_far_cells() {
    let mut sim = Simulation::new(small_config()).expect("valid config");
    sim.paint_brush(DVec2::ZERO, 1.0, 5.0);
    let field = sim.potential();
    let center = field.value_at(0.0, 0.0, true);
    for far in [
        DVec2::new(2.0, 0.0),
        DVec2::new(-2.0, 0.0),
        DVec2::new(0.0, 2.0),
        DVec2::new(0.0, -2.0),
    ] {
        let value = field.value_at(far.x, far.y, true);
        assert!((center - 5.0).abs() < (value - 5.0).abs());
        assert!(value.abs() < 1e-2);
    }
}

#[test]
fn boundary_lookups_report_wall() {
    let sim = Simulation::new(small_config()).expect("valid config");
    for discretized in [true, false] {
        for (x, y) in [(7.5, 0.0), (-7.5, 1.0), (0.0, 8.0), (100.0, -100.0)] {
            assert_eq!(sim.potential().value_at(x, y, discretized), 100.0);
        }
    }
}

#[test]
fn observation_collapses_to_unit_probability() {
    let packet = Packet::new(DVec2::new(1.0, -1.0), 90.0, 3.0, 0.5);
    let mut sim = Simulation::with_packet(small_config(), packet).expect("valid config");
    for _ in 0..50 {
        sim.advance(1);
    }
    let mut rng = StdRng::seed_from_u64(11);
    let measurement = sim.observe_with(24.0, &mut rng).expect("measurement");
    assert!((sim.total_probability() - 1.0).abs() < 1e-6);

    // Nearly all probability now sits at the measured point
    let (i, j) = measurement.cell;
    let near = sim
        .sum_probability(i.saturating_sub(2), (i + 2).min(38), j.saturating_sub(2), (j + 2).min(38))
        .expect("in bounds");
    assert!(near > 0.99);
}

#[test]
fn camera_ray_places_a_tile() {
    let mut sim = Simulation::new(small_config()).expect("valid config");
    let camera = PickingCamera::new(1.5);
    let ray = camera.mouse_ray(0.0, 0.0);

    let rect = sim.begin_tile_edit(&ray);
    assert_eq!(sim.edit_mode(), Some(EditMode::Tile));
    assert!(sim.potential().values().iter().all(|&v| v == 0.0));
    assert!(rect.cells().all(|c| sim.potential().preview_value(c) == 6.0));

    let written = sim.confirm_edit().expect("tile confirmed");
    assert!(written.cells().all(|c| sim.potential().value(c) == 6.0));
    assert_eq!(sim.potential().values(), sim.potential().preview_values());
}

#[test]
fn edits_do_not_disturb_a_running_step() {
    let mut sim = Simulation::new(small_config()).expect("valid config");
    sim.advance(3);
    let before = sim.wave().re.clone();
    sim.paint_brush(DVec2::new(3.0, 3.0), 1.0, 8.0);
    assert_eq!(sim.wave().re, before);
}

fn field() -> PotentialField {
    PotentialField::new(&small_config())
}

proptest! {
    #[test]
    fn brush_is_its_own_inverse(
        x in -6.0f64..6.0,
        y in -6.0f64..6.0,
        radius in 0.2f64..2.5,
        height in -25.0f64..25.0,
    ) {
        let mut field = field();
        let before = field.values().to_vec();
        let up = field.paint_brush(DVec2::new(x, y), radius, height);
        let down = field.paint_brush(DVec2::new(x, y), radius, -height);
        prop_assert_eq!(up, down);
        for (after, original) in field.values().iter().zip(&before) {
            prop_assert!((after - original).abs() < 1e-9);
        }
        prop_assert_eq!(field.values(), field.preview_values());
    }

    #[test]
    fn index_world_round_trip_within_one_spacing(i in 0usize..39) {
        let g = GridGeometry::new(&small_config());
        let world = g.index_to_world(i);
        let back = g.world_to_index(world);
        prop_assert!((back - i as f64).abs() < 1e-9);
        let nearest = g.nearest_cell(world, world);
        prop_assert_eq!(nearest, (i, i));
    }
}
