//! The traversal driver: owns the node arena, the root trees, the
//! per-frame accumulators, and the boxed seams to the renderer, terrain
//! source, and normal-map worker.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::camera::FrameCamera;
use crate::error::GlobeResult;
use crate::geo::{Ellipsoid, Extent, LonLat, Projection};
use crate::quadtree::{
    self, node, NodeArena, NodeKey, Quadrant, TraversalState, DEFAULT_LOD_SIZE, VISIBLE_DISTANCE,
};
use crate::render::RenderBackend;
use crate::terrain::{NormalMapCreator, TerrainSource, TerrainSpec};

/// Host-tunable planet construction parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanetOptions {
    pub terrain: TerrainSpec,
    /// Gates normal-map work entirely.
    pub light_enabled: bool,
    /// Coefficient of the `sqrt(altitude)` horizon-visibility bound.
    pub visible_distance: f64,
    /// Acceptable on-screen node diameter, pixels.
    pub lod_size: f64,
    /// Render exactly this zoom instead of screen-size acceptance.
    pub max_zoom: Option<u32>,
}

impl Default for PlanetOptions {
    fn default() -> Self {
        Self {
            terrain: TerrainSpec::default(),
            light_enabled: true,
            visible_distance: VISIBLE_DISTANCE,
            lod_size: DEFAULT_LOD_SIZE,
            max_zoom: None,
        }
    }
}

/// Accumulators the traversal writes during one frame. The driver resets
/// them at frame start; hosts read them afterwards.
#[derive(Debug, Default)]
pub struct FrameState {
    /// Registration order of rendered nodes; seam negotiation scans it
    /// tail-first.
    pub rendered: Vec<NodeKey>,
    /// Nodes contributed to layer collection this frame.
    pub layer_nodes: Vec<NodeKey>,
    pub min_curr_zoom: u32,
    pub max_curr_zoom: u32,
    /// Merged lon/lat extent of everything collected this frame.
    pub view_extent: Option<Extent>,
    /// The segment containing the camera's ground projection, if any.
    pub inside_segment: Option<NodeKey>,
    pub inside_position: Option<LonLat>,
}

impl FrameState {
    pub fn new() -> Self {
        let mut state = Self::default();
        state.reset();
        state
    }

    pub fn reset(&mut self) {
        self.rendered.clear();
        self.layer_nodes.clear();
        self.min_curr_zoom = u32::MAX;
        self.max_curr_zoom = 0;
        self.view_extent = None;
        self.inside_segment = None;
        self.inside_position = None;
    }

    /// Contribution of one visible segment to the layer lists.
    pub fn collect_render_node(&mut self, key: NodeKey, extent_lonlat: &Extent) {
        self.layer_nodes.push(key);
        self.add_view_extent(extent_lonlat);
    }

    pub fn add_view_extent(&mut self, extent_lonlat: &Extent) {
        self.view_extent = Some(match &self.view_extent {
            Some(v) => v.merged(extent_lonlat),
            None => *extent_lonlat,
        });
    }
}

/// A planet surface: one web-mercator quadtree between the mercator
/// latitude cutoffs plus two geographic polar caps. Roots live for the
/// planet's lifetime; everything below them is created and destroyed by
/// the camera.
pub struct Planet {
    ellipsoid: Ellipsoid,
    options: PlanetOptions,
    arena: NodeArena,
    roots: Vec<NodeKey>,
    frame: FrameState,
    created_nodes: u64,
    backend: Box<dyn RenderBackend>,
    terrain_source: Box<dyn TerrainSource>,
    normal_maps: Box<dyn NormalMapCreator>,
}

impl Planet {
    pub fn new(
        options: PlanetOptions,
        backend: Box<dyn RenderBackend>,
        terrain_source: Box<dyn TerrainSource>,
        normal_maps: Box<dyn NormalMapCreator>,
    ) -> GlobeResult<Self> {
        options.terrain.validate()?;
        let mut planet = Self {
            ellipsoid: Ellipsoid::WGS84,
            options,
            arena: NodeArena::new(),
            roots: Vec::new(),
            frame: FrameState::new(),
            created_nodes: 0,
            backend,
            terrain_source,
            normal_maps,
        };
        planet.create_roots();
        info!(
            "planet initialized: terrain zoom {}..{}, {} roots",
            planet.options.terrain.min_zoom,
            planet.options.terrain.max_zoom,
            planet.roots.len()
        );
        Ok(planet)
    }

    fn create_roots(&mut self) {
        let layouts = [
            (Projection::Mercator, Extent::full_mercator()),
            (Projection::Geographic, Extent::north_cap()),
            (Projection::Geographic, Extent::south_cap()),
        ];
        let Self {
            arena,
            options,
            ellipsoid,
            backend,
            terrain_source,
            normal_maps,
            created_nodes,
            roots,
            ..
        } = self;
        let mut ctx = node::TreeContext {
            arena,
            terrain: &options.terrain,
            ellipsoid,
            backend: backend.as_mut(),
            terrain_source: terrain_source.as_mut(),
            normal_maps: normal_maps.as_mut(),
            created_nodes,
            light_enabled: options.light_enabled,
            visible_distance: options.visible_distance,
            lod_size: options.lod_size,
        };
        for (projection, extent) in layouts {
            let key = node::create_node(&mut ctx, projection, Quadrant::NorthWest, None, 0, 0, extent);
            roots.push(key);
        }
    }

    /// One LOD frame: drain async completions, reset accounting, walk
    /// every root.
    pub fn render_frame(&mut self, camera: &FrameCamera) {
        self.render_frame_with(camera, false);
    }

    /// `only_terrain` warms terrain loads without registering anything
    /// for rendering.
    pub fn render_frame_with(&mut self, camera: &FrameCamera, only_terrain: bool) {
        self.ingest_completions();
        self.frame.reset();
        let roots = self.roots.clone();
        let Self {
            arena,
            options,
            ellipsoid,
            backend,
            terrain_source,
            normal_maps,
            created_nodes,
            frame,
            ..
        } = self;
        let mut ctx = node::TreeContext {
            arena,
            terrain: &options.terrain,
            ellipsoid,
            backend: backend.as_mut(),
            terrain_source: terrain_source.as_mut(),
            normal_maps: normal_maps.as_mut(),
            created_nodes,
            light_enabled: options.light_enabled,
            visible_distance: options.visible_distance,
            lod_size: options.lod_size,
        };
        let mut fv = node::FrameView {
            camera,
            state: frame,
            max_zoom: options.max_zoom,
            only_terrain,
        };
        for key in roots {
            node::render_tree(&mut ctx, &mut fv, key);
        }
    }

    /// Apply finished terrain and normal-map payloads. Completions whose
    /// node died (or whose arena slot was reused) are discarded.
    pub fn ingest_completions(&mut self) {
        let responses = self.terrain_source.poll_completed();
        for resp in responses {
            match self.arena.try_get_mut(resp.key) {
                Some(node) if node.node_id == resp.node_id => {
                    match node.segment.terrain_received(resp.data, self.backend.as_mut()) {
                        Ok(()) => {
                            node.applied_terrain_node_id = node.node_id;
                            let grid = node.segment.grid_size;
                            node.side_size = [grid; 4];
                        }
                        Err(e) => warn!("terrain payload rejected: {}", e),
                    }
                }
                _ => {
                    warn!("stale terrain payload for node {} discarded", resp.node_id);
                }
            }
        }

        let responses = self.normal_maps.poll_completed();
        for resp in responses {
            match self.arena.try_get_mut(resp.key) {
                Some(node) if node.node_id == resp.node_id => {
                    let seg = &mut node.segment;
                    seg.normal_map_ready = true;
                    seg.in_the_queue = false;
                    seg.normal_map_texture = Some(resp.texture);
                    seg.normal_map_texture_bias = [0.0, 0.0, 1.0];
                }
                _ => {
                    warn!("stale normal map for node {} discarded", resp.node_id);
                }
            }
        }
    }

    /// Drop every subtree whose root stopped the last walk. Hosts call
    /// this between frames at whatever cadence they like.
    pub fn clear_unused(&mut self) {
        self.with_ctx(|ctx, roots| {
            for key in roots {
                node::clear_tree(ctx, key);
            }
        });
    }

    /// Release imagery materials everywhere, keeping geometry.
    pub fn clear_layer_resources(&mut self) {
        self.with_ctx(|ctx, roots| {
            for key in roots {
                node::clear_branches(ctx, key);
            }
        });
    }

    /// Full teardown of everything below (and including) the roots.
    pub fn destroy(&mut self) {
        self.with_ctx(|ctx, roots| {
            for key in roots {
                node::destroy_branches(ctx, key);
                node::destroy(ctx, key);
            }
        });
        self.roots.clear();
    }

    fn with_ctx(&mut self, f: impl FnOnce(&mut node::TreeContext, Vec<NodeKey>)) {
        let roots = self.roots.clone();
        let Self {
            arena,
            options,
            ellipsoid,
            backend,
            terrain_source,
            normal_maps,
            created_nodes,
            ..
        } = self;
        let mut ctx = node::TreeContext {
            arena,
            terrain: &options.terrain,
            ellipsoid,
            backend: backend.as_mut(),
            terrain_source: terrain_source.as_mut(),
            normal_maps: normal_maps.as_mut(),
            created_nodes,
            light_enabled: options.light_enabled,
            visible_distance: options.visible_distance,
            lod_size: options.lod_size,
        };
        f(&mut ctx, roots);
    }

    // ---------- accessors ----------

    pub fn frame(&self) -> &FrameState {
        &self.frame
    }

    pub fn rendered_nodes(&self) -> &[NodeKey] {
        &self.frame.rendered
    }

    pub fn min_curr_zoom(&self) -> u32 {
        self.frame.min_curr_zoom
    }

    pub fn max_curr_zoom(&self) -> u32 {
        self.frame.max_curr_zoom
    }

    pub fn created_nodes_count(&self) -> u64 {
        self.created_nodes
    }

    pub fn roots(&self) -> &[NodeKey] {
        &self.roots
    }

    pub fn nodes(&self) -> &NodeArena {
        &self.arena
    }

    pub fn node(&self, key: NodeKey) -> &node::Node {
        self.arena.get(key)
    }

    /// Mutable node access for hosts that feed data in directly (tests,
    /// in-process providers).
    pub fn node_mut(&mut self, key: NodeKey) -> &mut node::Node {
        self.arena.get_mut(key)
    }

    pub fn ellipsoid(&self) -> &Ellipsoid {
        &self.ellipsoid
    }

    /// Tuning knobs; changes apply from the next frame.
    pub fn options_mut(&mut self) -> &mut PlanetOptions {
        &mut self.options
    }

    pub fn terrain_spec(&self) -> &TerrainSpec {
        &self.options.terrain
    }

    /// Effective traversal state of a node (ancestor-aware).
    pub fn node_state(&self, key: NodeKey) -> Option<TraversalState> {
        quadtree::get_state(&self.arena, key)
    }
}
