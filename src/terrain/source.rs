// src/terrain/source.rs
// The asynchronous terrain provider seam.
// RELEVANT FILES: src/terrain/channel.rs, src/segment/mod.rs

use super::TileIndex;
use crate::quadtree::NodeKey;

/// Fire-and-forget terrain request for one tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainRequest {
    pub key: NodeKey,
    pub node_id: i64,
    pub tile: TileIndex,
    /// Per-side tessellation the mesh must come back with.
    pub grid_size: u32,
}

/// Elevated mesh payload for one tile.
#[derive(Debug, Clone)]
pub struct TerrainData {
    /// `(grid_size + 1)^2 * 3` Cartesian coordinates, row-major north to
    /// south, west to east.
    pub vertices: Vec<f32>,
    pub grid_size: u32,
    /// Raw per-vertex normals at `file_grid_size` resolution, if the
    /// source precomputes them.
    pub normals: Option<Vec<f32>>,
}

/// Completion for an earlier [`TerrainRequest`]. `data == None` means the
/// source has no tile there: the segment keeps its plain ellipsoid mesh
/// and is marked ready with `terrain_exists = false`.
#[derive(Debug, Clone)]
pub struct TerrainResponse {
    pub key: NodeKey,
    pub node_id: i64,
    pub tile: TileIndex,
    pub data: Option<TerrainData>,
}

/// An asynchronous elevation source. `request` must not block; results
/// surface through `poll_completed`, typically one frame or more later.
pub trait TerrainSource {
    fn request(&mut self, req: TerrainRequest);

    fn poll_completed(&mut self) -> Vec<TerrainResponse>;
}

/// Source with no data anywhere: every request resolves to an empty tile
/// on the next poll.
#[derive(Debug, Default)]
pub struct EmptyTerrainSource {
    pending: Vec<TerrainRequest>,
}

impl TerrainSource for EmptyTerrainSource {
    fn request(&mut self, req: TerrainRequest) {
        self.pending.push(req);
    }

    fn poll_completed(&mut self) -> Vec<TerrainResponse> {
        self.pending
            .drain(..)
            .map(|req| TerrainResponse {
                key: req.key,
                node_id: req.node_id,
                tile: req.tile,
                data: None,
            })
            .collect()
    }
}
