//! Common utilities shared by the simulation engine and its hosts
//!
//! This crate provides picking rays, the orbital picking camera, and logging
//! setup used by both the headless runner and interactive front ends.

pub mod camera;
pub mod ray;

pub use camera::*;
pub use ray::*;

/// Initialize `env_logger` once per process.
///
/// Safe to call repeatedly (tests, multiple binaries sharing a harness);
/// later calls are ignored.
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
    log::debug!("logging initialized");
}
