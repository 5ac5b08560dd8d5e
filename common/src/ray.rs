//! Picking rays and plane intersection

use glam::DVec3;

/// Denominators smaller than this are treated as a ray running parallel to the plane.
pub const PARALLEL_EPSILON: f64 = 1e-8;

/// Stand-in denominator for parallel rays. Keeps the result finite (if huge).
pub const DEGENERATE_DENOMINATOR: f64 = -1e-6;

/// A ray cast from the camera into the scene
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: DVec3,
    pub direction: DVec3,
}

/// Result of intersecting a ray with a horizontal plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneHit {
    pub point: DVec3,
    /// Ray parameter `a` such that `point = origin + a * direction`
    pub distance: f64,
    /// Set when the direction was (nearly) parallel to the plane and a
    /// substitute denominator was used.
    pub degenerate: bool,
}

impl Ray {
    pub fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    /// Point at parameter `a` along the ray
    pub fn at(&self, a: f64) -> DVec3 {
        self.origin + self.direction * a
    }

    /// Intersect with the plane `z = plane_z`.
    ///
    /// Solves `a * direction.z + origin.z = plane_z`. A direction parallel to
    /// the plane does not fail: the denominator is swapped for
    /// [`DEGENERATE_DENOMINATOR`] and the hit is flagged as degenerate.
    pub fn intersect_plane_z(&self, plane_z: f64) -> PlaneHit {
        let degenerate = self.direction.z.abs() < PARALLEL_EPSILON;
        let denominator = if degenerate {
            DEGENERATE_DENOMINATOR
        } else {
            self.direction.z
        };

        let distance = (plane_z - self.origin.z) / denominator;
        PlaneHit {
            point: self.at(distance),
            distance,
            degenerate,
        }
    }

    /// Perpendicular distance from `point` to the infinite line through the ray
    pub fn distance_to_line(&self, point: DVec3) -> f64 {
        let dir = self.direction.normalize_or_zero();
        if dir == DVec3::ZERO {
            return point.distance(self.origin);
        }
        let offset = point - self.origin;
        (offset - dir * offset.dot(dir)).length()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertical_ray_hits_plane_below() {
        let ray = Ray::new(DVec3::new(0.5, -0.25, 2.0), DVec3::new(0.0, 0.0, -1.0));
        let hit = ray.intersect_plane_z(0.0);
        assert!(!hit.degenerate);
        assert!((hit.point - DVec3::new(0.5, -0.25, 0.0)).length() < 1e-12);
        assert!((hit.distance - 2.0).abs() < 1e-12);
    }

    #[test]
    fn parallel_ray_is_flagged_but_finite() {
        let ray = Ray::new(DVec3::new(0.0, 0.0, 1.0), DVec3::new(1.0, 0.0, 0.0));
        let hit = ray.intersect_plane_z(0.0);
        assert!(hit.degenerate);
        assert!(hit.point.is_finite());
        assert!(hit.distance.abs() > 1e5);
    }

    #[test]
    fn distance_to_line_is_perpendicular() {
        let ray = Ray::new(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0));
        let d = ray.distance_to_line(DVec3::new(5.0, 3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }
}
