//! Projection and geodesy utilities: lon/lat coordinates, web-mercator
//! conversion, extents, the reference ellipsoid, and bounding spheres.

pub mod bsphere;
pub mod ellipsoid;
pub mod extent;
pub mod lonlat;

pub use bsphere::BoundingSphere;
pub use ellipsoid::Ellipsoid;
pub use extent::Extent;
pub use lonlat::{LonLat, MAX_MERC_LAT, POLE, POLE_MERC};

use serde::{Deserialize, Serialize};

/// The two tile projections the quadtree carries. The mercator tree covers
/// `|lat| <= MAX_MERC_LAT`; the polar caps are geographic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    /// EPSG:4326, equirectangular lon/lat degrees.
    Geographic,
    /// EPSG:3857, web-mercator meters.
    Mercator,
}

impl Projection {
    /// The projection's full tiling span, in its own units.
    pub fn full_extent(&self) -> Extent {
        match self {
            Projection::Geographic => Extent::full_geographic(),
            Projection::Mercator => Extent::full_mercator(),
        }
    }

    /// An extent in this projection's units converted to lon/lat degrees.
    pub fn extent_to_lonlat(&self, extent: &Extent) -> Extent {
        match self {
            Projection::Geographic => *extent,
            Projection::Mercator => extent.inverse_mercator(),
        }
    }

    /// A point in this projection's units converted to lon/lat degrees.
    pub fn point_to_lonlat(&self, p: &LonLat) -> LonLat {
        match self {
            Projection::Geographic => *p,
            Projection::Mercator => p.from_mercator(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mercator_full_extent_to_lonlat() {
        let ll = Projection::Mercator.extent_to_lonlat(&Extent::full_mercator());
        assert!((ll.south_west.lon + 180.0).abs() < 1e-9);
        assert!((ll.north_east.lat - MAX_MERC_LAT).abs() < 1e-9);
    }
}
