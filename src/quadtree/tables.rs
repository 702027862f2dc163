// src/quadtree/tables.rs
// Quadrant/side enums, adjacency tables, traversal states, tuning.
// RELEVANT FILES: src/quadtree/node.rs, src/geo/extent.rs

/// Child slot within a parent cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Quadrant {
    NorthWest = 0,
    NorthEast = 1,
    SouthWest = 2,
    SouthEast = 3,
}

impl Quadrant {
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthWest,
        Quadrant::NorthEast,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Edge of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Side {
    North = 0,
    East = 1,
    South = 2,
    West = 3,
}

impl Side {
    pub const ALL: [Side; 4] = [Side::North, Side::East, Side::South, Side::West];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Side {
        OPSIDE[self.index()]
    }
}

/// Opposite edge, indexed by [`Side`].
pub const OPSIDE: [Side; 4] = [Side::South, Side::West, Side::North, Side::East];

/// Sibling across a side within the same parent, or `None` when the
/// neighbor lies outside the parent. Indexed `[side][quadrant]`.
pub const NEIGHBOUR: [[Option<Quadrant>; 4]; 4] = [
    // North
    [None, None, Some(Quadrant::NorthWest), Some(Quadrant::NorthEast)],
    // East
    [Some(Quadrant::NorthEast), None, Some(Quadrant::SouthEast), None],
    // South
    [Some(Quadrant::SouthWest), Some(Quadrant::SouthEast), None, None],
    // West
    [None, Some(Quadrant::NorthWest), None, Some(Quadrant::SouthWest)],
];

/// Mirror of a quadrant across a side; the descent table when a recorded
/// ancestor path is replayed inside the neighbor subtree. Indexed
/// `[side][quadrant]`.
pub const OPPART: [[Quadrant; 4]; 4] = [
    // North
    [Quadrant::SouthWest, Quadrant::SouthEast, Quadrant::NorthWest, Quadrant::NorthEast],
    // East
    [Quadrant::NorthEast, Quadrant::NorthWest, Quadrant::SouthEast, Quadrant::SouthWest],
    // South
    [Quadrant::SouthWest, Quadrant::SouthEast, Quadrant::NorthWest, Quadrant::NorthEast],
    // West
    [Quadrant::NorthEast, Quadrant::NorthWest, Quadrant::SouthEast, Quadrant::SouthWest],
];

/// Per-frame traversal outcome of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalState {
    /// Delegated the decision to its children.
    Walkthrough,
    /// Registered for rendering this frame.
    Rendering,
    /// Visible-set member rejected, or culled outright.
    NotRendering,
}

/// Coefficient of the `sqrt(altitude)` horizon-distance visibility bound.
pub const VISIBLE_DISTANCE: f64 = 3570.0;

/// Below this camera altitude the horizon-distance test is authoritative:
/// a node that fails it is hidden rather than rendered coarse.
pub const NEAR_ALTITUDE: f64 = 3_000_000.0;

/// Above this altitude distant nodes contribute to layer collection even
/// when the horizon test fails.
pub const HIGH_ALTITUDE: f64 = 10_000.0;

/// Default acceptable on-screen diameter of a rendered node, pixels.
pub const DEFAULT_LOD_SIZE: f64 = 256.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opside_is_an_involution() {
        for s in Side::ALL {
            assert_eq!(s.opposite().opposite(), s);
        }
    }

    #[test]
    fn test_neighbour_table_is_symmetric() {
        // if q's neighbor across s is p, then p's neighbor across
        // opposite(s) is q
        for s in Side::ALL {
            for q in Quadrant::ALL {
                if let Some(p) = NEIGHBOUR[s.index()][q.index()] {
                    assert_eq!(
                        NEIGHBOUR[s.opposite().index()][p.index()],
                        Some(q),
                        "side {:?} part {:?}",
                        s,
                        q
                    );
                }
            }
        }
    }

    #[test]
    fn test_oppart_is_an_involution_per_side() {
        for s in Side::ALL {
            for q in Quadrant::ALL {
                let m = OPPART[s.index()][q.index()];
                assert_eq!(OPPART[s.index()][m.index()], q);
            }
        }
    }

    #[test]
    fn test_oppart_crosses_the_side() {
        // a quadrant touching side s must mirror to one that does not,
        // and vice versa (N/S flip rows, E/W flip columns)
        assert_eq!(OPPART[Side::East.index()][Quadrant::NorthEast.index()], Quadrant::NorthWest);
        assert_eq!(OPPART[Side::North.index()][Quadrant::NorthWest.index()], Quadrant::SouthWest);
        assert_eq!(OPPART[Side::South.index()][Quadrant::SouthEast.index()], Quadrant::NorthEast);
        assert_eq!(OPPART[Side::West.index()][Quadrant::SouthWest.index()], Quadrant::SouthEast);
    }
}
