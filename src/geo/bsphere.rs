// src/geo/bsphere.rs
// Bounding sphere culling primitive.
// RELEVANT FILES: src/quadtree/node.rs, src/camera.rs

use glam::DVec3;

/// The per-segment culling primitive, in earth-centered Cartesian.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoundingSphere {
    pub center: DVec3,
    pub radius: f64,
}

impl BoundingSphere {
    pub fn new(center: DVec3, radius: f64) -> Self {
        Self { center, radius }
    }

    /// Smallest sphere enclosing two points.
    pub fn from_two_points(a: DVec3, b: DVec3) -> Self {
        Self {
            center: (a + b) * 0.5,
            radius: a.distance(b) * 0.5,
        }
    }

    /// Enclosing sphere of a point cloud: centroid center, max-distance
    /// radius. Not minimal, but stable and sufficient for culling.
    pub fn from_points(points: &[DVec3]) -> Self {
        if points.is_empty() {
            return Self::default();
        }
        let center = points.iter().copied().sum::<DVec3>() / points.len() as f64;
        let radius = points
            .iter()
            .map(|p| p.distance(center))
            .fold(0.0_f64, f64::max);
        Self { center, radius }
    }

    pub fn contains_point(&self, p: DVec3) -> bool {
        self.center.distance(p) <= self.radius
    }
}
