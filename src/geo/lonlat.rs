// src/geo/lonlat.rs
// Geodetic coordinates and the spherical web-mercator forward/inverse pair.
// RELEVANT FILES: src/geo/extent.rs, src/geo/ellipsoid.rs

use serde::{Deserialize, Serialize};

/// Half-span of the geographic longitude axis, degrees.
pub const POLE: f64 = 180.0;

/// Half-span of the EPSG:3857 plane, meters.
pub const POLE_MERC: f64 = 20037508.342789244;

/// Highest latitude representable in web-mercator, degrees.
/// Above this the planet is covered by geographic polar caps.
pub const MAX_MERC_LAT: f64 = 85.05112877980659;

/// A longitude/latitude pair with an ellipsoidal height.
///
/// The same type carries web-mercator plane coordinates (meters in
/// `lon`/`lat`) when a segment's projection is EPSG:3857; callers keep
/// track of which space a value lives in, exactly as extents do.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
    pub height: f64,
}

impl LonLat {
    pub fn new(lon: f64, lat: f64, height: f64) -> Self {
        Self { lon, lat, height }
    }

    /// Geographic degrees to web-mercator meters. Latitude must be within
    /// `±MAX_MERC_LAT`; callers clamp before converting.
    pub fn to_mercator(&self) -> LonLat {
        let x = self.lon * POLE_MERC / POLE;
        let lat_rad = self.lat.to_radians();
        let y = ((std::f64::consts::FRAC_PI_4 + lat_rad * 0.5).tan()).ln() / std::f64::consts::PI
            * POLE_MERC;
        LonLat::new(x, y, self.height)
    }

    /// Web-mercator meters back to geographic degrees.
    pub fn from_mercator(&self) -> LonLat {
        let lon = self.lon / POLE_MERC * POLE;
        let lat = (2.0 * ((self.lat / POLE_MERC * std::f64::consts::PI).exp()).atan()
            - std::f64::consts::FRAC_PI_2)
            .to_degrees();
        LonLat::new(lon, lat, self.height)
    }

    /// Same position with latitude clamped into the mercator band.
    pub fn clamp_to_mercator_band(&self) -> LonLat {
        LonLat::new(
            self.lon,
            self.lat.clamp(-MAX_MERC_LAT, MAX_MERC_LAT),
            self.height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_roundtrip() {
        let p = LonLat::new(37.6173, 55.7558, 0.0);
        let m = p.to_mercator();
        let back = m.from_mercator();
        assert!((back.lon - p.lon).abs() < 1e-9, "lon diff {}", back.lon - p.lon);
        assert!((back.lat - p.lat).abs() < 1e-9, "lat diff {}", back.lat - p.lat);
    }

    #[test]
    fn test_mercator_pole_maps_to_plane_corner() {
        let p = LonLat::new(180.0, MAX_MERC_LAT, 0.0);
        let m = p.to_mercator();
        assert!((m.lon - POLE_MERC).abs() < 1e-6);
        assert!((m.lat - POLE_MERC).abs() < 1e-6);
    }

    #[test]
    fn test_equator_maps_to_zero() {
        let m = LonLat::new(0.0, 0.0, 0.0).to_mercator();
        assert_eq!(m.lon, 0.0);
        assert_eq!(m.lat, 0.0);
    }

    #[test]
    fn test_clamp_to_mercator_band() {
        let p = LonLat::new(10.0, 89.0, 0.0).clamp_to_mercator_band();
        assert_eq!(p.lat, MAX_MERC_LAT);
        assert_eq!(p.lon, 10.0);
    }
}
