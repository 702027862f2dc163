//! Terrain configuration and the asynchronous provider seams.
//!
//! The terrain source and the normal-map worker run off-frame; the core
//! hands them fire-and-forget requests and drains their completions at the
//! start of the next frame. Completions address nodes by arena key *and*
//! node id so a payload that outlives its node is discarded, never applied
//! to a reused slot.

pub mod channel;
pub mod normalmap;
pub mod source;

pub use channel::ChannelTerrainSource;
pub use normalmap::{NormalMapCreator, NormalMapRequest, NormalMapResponse, QueueNormalMapCreator};
pub use source::{EmptyTerrainSource, TerrainData, TerrainRequest, TerrainResponse, TerrainSource};

use crate::error::{GlobeError, GlobeResult};
use serde::{Deserialize, Serialize};

/// Tile address in the quadtree pyramid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileIndex {
    pub z: u32,
    pub x: u32,
    pub y: u32,
}

impl TileIndex {
    pub fn new(z: u32, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// The covering tile one zoom level up.
    pub fn parent(&self) -> Option<TileIndex> {
        if self.z == 0 {
            None
        } else {
            Some(TileIndex::new(self.z - 1, self.x / 2, self.y / 2))
        }
    }
}

/// Static description of the terrain source pyramid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerrainSpec {
    /// Lowest zoom at which real terrain exists; below it tiles are plain
    /// ellipsoid patches.
    pub min_zoom: u32,
    /// Deepest zoom the source serves; deeper tiles inherit from it.
    pub max_zoom: u32,
    /// Per-side sample count of source normal-map files.
    pub file_grid_size: u32,
    /// Per-side mesh tessellation by zoom level. Also bounds tree depth:
    /// traversal stops splitting at `len() - 1`.
    pub grid_size_by_zoom: Vec<u32>,
}

impl TerrainSpec {
    /// Mesh tessellation for a zoom level; levels past the table fall back
    /// to the deepest entry, an empty table to 1.
    pub fn grid_size(&self, zoom: u32) -> u32 {
        self.grid_size_by_zoom
            .get(zoom as usize)
            .or_else(|| self.grid_size_by_zoom.last())
            .copied()
            .unwrap_or(1)
    }

    /// Deepest zoom the traversal may split to.
    pub fn max_node_zoom(&self) -> u32 {
        (self.grid_size_by_zoom.len() as u32).saturating_sub(1)
    }

    pub fn validate(&self) -> GlobeResult<()> {
        if self.grid_size_by_zoom.is_empty() {
            return Err(GlobeError::config("grid_size_by_zoom must not be empty"));
        }
        if self.min_zoom > self.max_zoom {
            return Err(GlobeError::config(format!(
                "min_zoom {} exceeds max_zoom {}",
                self.min_zoom, self.max_zoom
            )));
        }
        for (z, &g) in self.grid_size_by_zoom.iter().enumerate() {
            if g == 0 || !g.is_power_of_two() {
                return Err(GlobeError::config(format!(
                    "grid size {} at zoom {} is not a power of two",
                    g, z
                )));
            }
        }
        if !self.file_grid_size.is_power_of_two() {
            return Err(GlobeError::config(format!(
                "file_grid_size {} is not a power of two",
                self.file_grid_size
            )));
        }
        Ok(())
    }
}

impl Default for TerrainSpec {
    fn default() -> Self {
        Self {
            min_zoom: 3,
            max_zoom: 14,
            file_grid_size: 128,
            grid_size_by_zoom: vec![32; 20],
        }
    }
}
