// src/geo/extent.rs
// Axis-aligned lon/lat rectangles and their exact-midpoint subdivision.
// RELEVANT FILES: src/geo/lonlat.rs, src/quadtree/node.rs

use super::lonlat::{LonLat, MAX_MERC_LAT, POLE, POLE_MERC};
use crate::quadtree::Quadrant;

/// An axis-aligned rectangle in lon/lat (or web-mercator meters, for
/// EPSG:3857 segments). Invariant: `sw.lon <= ne.lon && sw.lat <= ne.lat`.
///
/// Quadrant subdivision uses `sw + 0.5 * (ne - sw)`, so corner coordinates
/// of tiles that share a split origin stay bitwise-equal across zoom
/// levels. Neighbor detection relies on that exactness; no epsilon
/// comparisons anywhere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub south_west: LonLat,
    pub north_east: LonLat,
}

impl Extent {
    pub fn new(south_west: LonLat, north_east: LonLat) -> Self {
        debug_assert!(south_west.lon <= north_east.lon);
        debug_assert!(south_west.lat <= north_east.lat);
        Self {
            south_west,
            north_east,
        }
    }

    pub fn from_degrees(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self::new(LonLat::new(west, south, 0.0), LonLat::new(east, north, 0.0))
    }

    /// Full geographic span, degrees.
    pub fn full_geographic() -> Self {
        Self::from_degrees(-POLE, -90.0, POLE, 90.0)
    }

    /// Full EPSG:3857 span, meters.
    pub fn full_mercator() -> Self {
        Self::from_degrees(-POLE_MERC, -POLE_MERC, POLE_MERC, POLE_MERC)
    }

    /// North polar cap, degrees.
    pub fn north_cap() -> Self {
        Self::from_degrees(-POLE, MAX_MERC_LAT, POLE, 90.0)
    }

    /// South polar cap, degrees.
    pub fn south_cap() -> Self {
        Self::from_degrees(-POLE, -90.0, POLE, -MAX_MERC_LAT)
    }

    pub fn width(&self) -> f64 {
        self.north_east.lon - self.south_west.lon
    }

    pub fn height(&self) -> f64 {
        self.north_east.lat - self.south_west.lat
    }

    pub fn center(&self) -> LonLat {
        LonLat::new(
            self.south_west.lon + self.width() * 0.5,
            self.south_west.lat + self.height() * 0.5,
            0.0,
        )
    }

    /// Closed containment test.
    pub fn is_inside(&self, p: &LonLat) -> bool {
        p.lon >= self.south_west.lon
            && p.lon <= self.north_east.lon
            && p.lat >= self.south_west.lat
            && p.lat <= self.north_east.lat
    }

    /// One of the four equal quadrants of this extent.
    pub fn quadrant(&self, q: Quadrant) -> Extent {
        let sw = self.south_west;
        let ne = self.north_east;
        let mid_lon = sw.lon + 0.5 * (ne.lon - sw.lon);
        let mid_lat = sw.lat + 0.5 * (ne.lat - sw.lat);
        match q {
            Quadrant::NorthWest => Extent::new(
                LonLat::new(sw.lon, mid_lat, 0.0),
                LonLat::new(mid_lon, ne.lat, 0.0),
            ),
            Quadrant::NorthEast => Extent::new(
                LonLat::new(mid_lon, mid_lat, 0.0),
                LonLat::new(ne.lon, ne.lat, 0.0),
            ),
            Quadrant::SouthWest => Extent::new(
                LonLat::new(sw.lon, sw.lat, 0.0),
                LonLat::new(mid_lon, mid_lat, 0.0),
            ),
            Quadrant::SouthEast => Extent::new(
                LonLat::new(mid_lon, sw.lat, 0.0),
                LonLat::new(ne.lon, mid_lat, 0.0),
            ),
        }
    }

    /// Smallest extent covering both.
    pub fn merged(&self, other: &Extent) -> Extent {
        Extent::new(
            LonLat::new(
                self.south_west.lon.min(other.south_west.lon),
                self.south_west.lat.min(other.south_west.lat),
                0.0,
            ),
            LonLat::new(
                self.north_east.lon.max(other.north_east.lon),
                self.north_east.lat.max(other.north_east.lat),
                0.0,
            ),
        )
    }

    /// Mercator-meter extent converted to geographic degrees.
    pub fn inverse_mercator(&self) -> Extent {
        Extent::new(
            self.south_west.from_mercator(),
            self.north_east.from_mercator(),
        )
    }
}
