//! Per-frame camera state consumed by the traversal.
//!
//! The host's camera system owns motion and matrices; the core reads one
//! immutable snapshot per frame: eye position, geodetic position with its
//! mercator shadow, and a culling frustum.

use glam::{DMat4, DVec3, DVec4};

use crate::geo::LonLat;
use crate::segment::LodCamera;

/// Six-plane view frustum for sphere culling.
#[derive(Debug, Clone, Copy)]
pub struct Frustum {
    planes: [DVec4; 6],
}

impl Frustum {
    /// Extract clip planes from a combined view-projection matrix
    /// (row-based Gribb/Hartmann form, normals pointing inward).
    pub fn from_view_proj(m: &DMat4) -> Self {
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);
        let mut planes = [r3 + r0, r3 - r0, r3 + r1, r3 - r1, r3 + r2, r3 - r2];
        for p in &mut planes {
            let len = p.truncate().length();
            if len > 0.0 {
                *p /= len;
            }
        }
        Self { planes }
    }

    /// Frustum that contains everything; tests and warm-up passes use it.
    pub fn infinite() -> Self {
        Self {
            planes: [DVec4::new(0.0, 0.0, 0.0, 1.0); 6],
        }
    }

    pub fn contains_sphere(&self, center: DVec3, radius: f64) -> bool {
        self.planes
            .iter()
            .all(|p| p.truncate().dot(center) + p.w > -radius)
    }
}

/// Immutable camera snapshot for one frame.
#[derive(Debug, Clone)]
pub struct FrameCamera {
    /// Eye position, earth-centered Cartesian meters.
    pub eye: DVec3,
    /// Geodetic position; `height` is the altitude above the ellipsoid.
    pub lon_lat: LonLat,
    /// `lon_lat` in web-mercator meters, latitude clamped to the band.
    pub lon_lat_merc: LonLat,
    pub frustum: Frustum,
    /// Viewport height in pixels, for projected-size LOD decisions.
    pub viewport_height: f64,
    /// Vertical field of view, radians.
    pub fov_y: f64,
}

impl FrameCamera {
    pub fn new(
        eye: DVec3,
        lon_lat: LonLat,
        viewport_height: f64,
        fov_y: f64,
        frustum: Frustum,
    ) -> Self {
        Self {
            eye,
            lon_lat,
            lon_lat_merc: lon_lat.clamp_to_mercator_band().to_mercator(),
            frustum,
            viewport_height,
            fov_y,
        }
    }

    /// Camera altitude above the ellipsoid, meters.
    pub fn altitude(&self) -> f64 {
        self.lon_lat.height
    }
}

impl LodCamera for FrameCamera {
    fn projected_size(&self, center: DVec3, diameter: f64) -> f64 {
        let distance = self.eye.distance(center).max(1.0);
        let pixels_per_world_unit =
            (self.viewport_height * 0.5) / (distance * (self.fov_y * 0.5).tan());
        diameter * pixels_per_world_unit
    }
}
