// src/geo/ellipsoid.rs
// Reference ellipsoid and geodetic-to-Cartesian conversion.
// RELEVANT FILES: src/geo/lonlat.rs, src/segment/mesh.rs

use super::lonlat::LonLat;
use glam::DVec3;

/// An oblate reference ellipsoid in earth-centered Cartesian space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    /// Equatorial radius, meters.
    pub a: f64,
    /// Polar radius, meters.
    pub b: f64,
    e2: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6378137.0,
        b: 6356752.3142451793,
        e2: 0.006694379990141317,
    };

    pub fn new(a: f64, b: f64) -> Self {
        let e2 = (a * a - b * b) / (a * a);
        Self { a, b, e2 }
    }

    /// Equatorial radius accessor; the root bounding sphere uses it.
    pub fn equatorial_radius(&self) -> f64 {
        self.a
    }

    /// Geodetic lon/lat/height to earth-centered Cartesian.
    pub fn lonlat_to_cartesian(&self, ll: &LonLat) -> DVec3 {
        let lat = ll.lat.to_radians();
        let lon = ll.lon.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        let n = self.a / (1.0 - self.e2 * sin_lat * sin_lat).sqrt();
        DVec3::new(
            (n + ll.height) * cos_lat * cos_lon,
            (n + ll.height) * cos_lat * sin_lon,
            (n * (1.0 - self.e2) + ll.height) * sin_lat,
        )
    }

    /// Outward geodetic surface normal at a lon/lat position.
    pub fn geodetic_normal(&self, ll: &LonLat) -> DVec3 {
        let lat = ll.lat.to_radians();
        let lon = ll.lon.to_radians();
        let (sin_lat, cos_lat) = lat.sin_cos();
        let (sin_lon, cos_lon) = lon.sin_cos();
        DVec3::new(cos_lat * cos_lon, cos_lat * sin_lon, sin_lat)
    }
}
