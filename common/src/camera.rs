//! Orbital camera used to turn pointer positions into picking rays
//!
//! The scene is z-up: the potential surface lives in the xy plane and heights
//! rise along +z. Coordinates are the normalized display system the grid
//! engine uses (the simulation square spans [-1, 1] on both axes).

use crate::ray::Ray;
use glam::{Mat4, Vec3, Vec4};

/// Perspective camera orbiting the origin with z as "up"
#[derive(Debug, Clone)]
pub struct PickingCamera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    // Orbital parameters
    pub distance: f32,
    pub yaw: f32,
    pub pitch: f32,
}

impl PickingCamera {
    /// Lowest pitch allowed: the camera never dips below the surface plane
    const MIN_PITCH: f32 = 0.05;
    /// Highest pitch allowed: stops just short of looking straight down
    const MAX_PITCH: f32 = 1.55;

    pub fn new(aspect_ratio: f32) -> Self {
        // Starts slightly off-axis, looking down at the origin
        let start = Vec3::new(0.6, 0.0, 1.5);
        let distance = start.length();
        let pitch = (start.z / distance).asin();
        let yaw = start.y.atan2(start.x);

        let mut camera = Self {
            position: start,
            target: Vec3::ZERO,
            up: Vec3::Z,
            fov: 45.0f32.to_radians(),
            aspect_ratio,
            near: 0.1,
            far: 100.0,
            distance,
            yaw,
            pitch,
        };
        camera.update_orbital();
        camera
    }

    /// Update camera position based on orbital parameters
    pub fn update_orbital(&mut self) {
        self.position = self.target
            + Vec3::new(
                self.distance * self.pitch.cos() * self.yaw.cos(),
                self.distance * self.pitch.cos() * self.yaw.sin(),
                self.distance * self.pitch.sin(),
            );
    }

    /// Orbit the camera around the target
    pub fn orbit(&mut self, delta_yaw: f32, delta_pitch: f32) {
        self.yaw += delta_yaw;
        self.pitch = (self.pitch + delta_pitch).clamp(Self::MIN_PITCH, Self::MAX_PITCH);
        self.update_orbital();
    }

    /// Zoom in/out
    pub fn zoom(&mut self, delta: f32) {
        self.distance = (self.distance - delta).clamp(0.1, 4.0);
        self.update_orbital();
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// OpenGL-style clip space (depth in [-1, 1])
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.fov, self.aspect_ratio, self.near, self.far)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn update_aspect_ratio(&mut self, aspect_ratio: f32) {
        self.aspect_ratio = aspect_ratio;
    }

    /// Ray from the eye through a normalized screen point.
    ///
    /// The screen point is un-projected at clip depth 0 and the eye position
    /// subtracted to get the direction.
    pub fn mouse_ray(&self, ndc_x: f32, ndc_y: f32) -> Ray {
        let inverse = self.view_projection().inverse();
        let clip = inverse * Vec4::new(ndc_x, ndc_y, 0.0, 1.0);
        let point = clip.truncate() / clip.w;
        let direction = (point - self.position).normalize_or_zero();

        Ray::new(self.position.as_dvec3(), direction.as_dvec3())
    }
}

/// Convert a pixel position into normalized screen coordinates (y up)
pub fn screen_to_ndc(x: f64, y: f64, width: f64, height: f64) -> (f64, f64) {
    (2.0 * x / width - 1.0, 1.0 - 2.0 * y / height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_ray_points_at_target() {
        let camera = PickingCamera::new(1.5);
        let ray = camera.mouse_ray(0.0, 0.0);
        let hit = ray.intersect_plane_z(0.0);
        assert!(!hit.degenerate);
        assert!(hit.point.truncate().length() < 1e-4);
    }

    #[test]
    fn orbit_keeps_camera_above_surface() {
        let mut camera = PickingCamera::new(1.0);
        camera.orbit(0.3, -10.0);
        assert!(camera.position.z > 0.0);
        camera.orbit(0.0, 10.0);
        assert!(camera.pitch <= PickingCamera::MAX_PITCH);
    }

    #[test]
    fn screen_corners_map_to_unit_square() {
        assert_eq!(screen_to_ndc(0.0, 0.0, 800.0, 600.0), (-1.0, 1.0));
        assert_eq!(screen_to_ndc(800.0, 600.0, 800.0, 600.0), (1.0, -1.0));
    }
}
