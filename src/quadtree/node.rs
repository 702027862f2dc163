//! The quadtree cell and its per-frame algorithms: visibility-driven
//! split/collapse, neighbor resolution, seam-size negotiation, and
//! ancestor-data inheritance while terrain loads.
//!
//! Nodes live in a [`NodeArena`]; every algorithm here is a free function
//! over `(context, key)` so the borrow of the arena stays explicit. The
//! per-frame accumulators travel in [`FrameView`], never in globals.

use glam::DVec3;
use log::debug;

use super::arena::{NodeArena, NodeKey};
use super::tables::{
    Quadrant, Side, TraversalState, HIGH_ALTITUDE, NEAR_ALTITUDE, NEIGHBOUR, OPPART,
};
use crate::camera::FrameCamera;
use crate::geo::{BoundingSphere, Ellipsoid, Extent, Projection, MAX_MERC_LAT, POLE};
use crate::planet::FrameState;
use crate::render::RenderBackend;
use crate::segment::mesh::{cell_patch, grid_point, interp_in_cell, sub_matrix};
use crate::segment::Segment;
use crate::terrain::{NormalMapCreator, NormalMapRequest, TerrainSource, TerrainSpec};

/// A quadtree cell owning one [`Segment`].
#[derive(Debug)]
pub struct Node {
    pub segment: Segment,
    pub parent: Option<NodeKey>,
    /// NW, NE, SW, SE child slots; all four present iff `ready`.
    pub children: [Option<NodeKey>; 4],
    /// Per-side neighbor chosen during seam negotiation, re-resolved
    /// every frame.
    pub neighbors: [Option<NodeKey>; 4],
    pub has_neighbor: [bool; 4],
    /// Per-side tessellation actually used on rendering, possibly reduced
    /// to meet a coarser neighbor.
    pub side_size: [u32; 4],
    /// Child slot this node occupies in its parent (NW at roots).
    pub part_id: Quadrant,
    /// Stable tree address: `parent_id * 4 + part + 1`, 0 at roots.
    pub node_id: i64,
    /// Per-frame traversal outcome; `None` before the first visit.
    pub state: Option<TraversalState>,
    /// `node_id` of the ancestor whose terrain currently backs this mesh,
    /// -1 when none has been applied.
    pub applied_terrain_node_id: i64,
    /// Children slots are populated.
    pub ready: bool,
    /// Extent contains the camera's ground projection.
    pub camera_inside: bool,
}

/// Shared services a tree mutation needs.
pub struct TreeContext<'a> {
    pub arena: &'a mut NodeArena,
    pub terrain: &'a TerrainSpec,
    pub ellipsoid: &'a Ellipsoid,
    pub backend: &'a mut dyn RenderBackend,
    pub terrain_source: &'a mut dyn TerrainSource,
    pub normal_maps: &'a mut dyn NormalMapCreator,
    pub created_nodes: &'a mut u64,
    pub light_enabled: bool,
    pub visible_distance: f64,
    pub lod_size: f64,
}

/// Per-frame traversal inputs and accumulators.
pub struct FrameView<'a> {
    pub camera: &'a FrameCamera,
    pub state: &'a mut FrameState,
    /// Render exactly this zoom when set, instead of screen-size
    /// acceptance.
    pub max_zoom: Option<u32>,
    /// Warm terrain without registering anything visible.
    pub only_terrain: bool,
}

/// Build a node, compute its bounds, and register it in the arena.
pub fn create_node(
    ctx: &mut TreeContext,
    projection: Projection,
    part_id: Quadrant,
    parent: Option<NodeKey>,
    node_id: i64,
    tile_zoom: u32,
    extent: Extent,
) -> NodeKey {
    let segment = Segment::new(projection, extent, tile_zoom, ctx.terrain);
    let grid = segment.grid_size;
    let node = Node {
        segment,
        parent,
        children: [None; 4],
        neighbors: [None; 4],
        has_neighbor: [false; 4],
        side_size: [grid; 4],
        part_id,
        node_id,
        state: None,
        applied_terrain_node_id: -1,
        ready: false,
        camera_inside: false,
    };
    let key = ctx.arena.insert(node);
    create_bounds(ctx, key);
    *ctx.created_nodes += 1;
    key
}

/// Split the extent at its midpoint and instantiate the four children.
/// Called at most once between destruction cycles.
pub fn create_children_nodes(ctx: &mut TreeContext, key: NodeKey) {
    let (projection, extent, zoom, node_id) = {
        let n = ctx.arena.get(key);
        (
            n.segment.projection,
            n.segment.extent,
            n.segment.tile_zoom,
            n.node_id,
        )
    };
    for q in Quadrant::ALL {
        let child = create_node(
            ctx,
            projection,
            q,
            Some(key),
            node_id * 4 + q.index() as i64 + 1,
            zoom + 1,
            extent.quadrant(q),
        );
        ctx.arena.get_mut(key).children[q.index()] = Some(child);
    }
    ctx.arena.get_mut(key).ready = true;
}

/// Nearest ancestor satisfying a segment predicate.
fn find_ancestor(
    arena: &NodeArena,
    key: NodeKey,
    pred: impl Fn(&Node) -> bool,
) -> Option<NodeKey> {
    let mut cur = arena.get(key).parent;
    while let Some(p) = cur {
        let n = arena.get(p);
        if pred(n) {
            return Some(p);
        }
        cur = n.parent;
    }
    None
}

/// Choose a bounding sphere: trivial at the root, extent-fitted below the
/// terrain pyramid, and derived from the nearest loaded ancestor's mesh
/// everywhere else so the sphere never leaves the rendered surface.
pub fn create_bounds(ctx: &mut TreeContext, key: NodeKey) {
    let (zoom, tile_x, tile_y) = {
        let s = &ctx.arena.get(key).segment;
        (s.tile_zoom, s.tile_x, s.tile_y)
    };

    if zoom == 0 {
        ctx.arena.get_mut(key).segment.bsphere =
            BoundingSphere::new(DVec3::ZERO, ctx.ellipsoid.equatorial_radius());
        return;
    }
    if zoom < ctx.terrain.min_zoom {
        let ellipsoid = *ctx.ellipsoid;
        ctx.arena
            .get_mut(key)
            .segment
            .create_bounds_by_extent(&ellipsoid);
        return;
    }

    let Some(anc) = find_ancestor(ctx.arena, key, |n| n.segment.terrain_ready) else {
        let ellipsoid = *ctx.ellipsoid;
        ctx.arena
            .get_mut(key)
            .segment
            .create_bounds_by_extent(&ellipsoid);
        return;
    };

    let sphere = {
        let aseg = &ctx.arena.get(anc).segment;
        let dz2 = 1u32 << (zoom - aseg.tile_zoom);
        let off_x = tile_x - aseg.tile_x * dz2;
        let off_y = tile_y - aseg.tile_y * dz2;
        let grid = aseg.grid_size;
        if grid >= dz2 {
            let sub = grid / dz2;
            let v0 = grid_point(&aseg.terrain_vertices, grid, sub * off_y, sub * off_x);
            let v1 = grid_point(
                &aseg.terrain_vertices,
                grid,
                sub * off_y + sub,
                sub * off_x + sub,
            );
            BoundingSphere::from_two_points(v0, v1)
        } else {
            // self is deeper than one ancestor cell per axis: interpolate
            // the extent diagonal inside that single cell
            let inside = dz2 / grid;
            let i0 = off_y / inside;
            let j0 = off_x / inside;
            let vi_x = (off_x - j0 * inside) as f64;
            let vi_y = (off_y - i0 * inside) as f64;
            let patch = cell_patch(&aseg.terrain_vertices, grid, i0, j0);
            let p0 = interp_in_cell(&patch, vi_x, vi_y, inside as f64);
            let p1 = interp_in_cell(&patch, vi_x + 1.0, vi_y + 1.0, inside as f64);
            BoundingSphere::from_two_points(p0, p1)
        }
    };
    ctx.arena.get_mut(key).segment.bsphere = sphere;
}

/// Per-frame traversal entry: classify visibility, then split, render, or
/// reject this cell.
pub fn render_tree(ctx: &mut TreeContext, fv: &mut FrameView, key: NodeKey) {
    {
        let node = ctx.arena.get_mut(key);
        node.state = Some(TraversalState::Walkthrough);
        node.neighbors = [None; 4];
        node.has_neighbor = [false; 4];
    }

    // camera-inside flag propagates down from the root
    let parent = ctx.arena.get(key).parent;
    let camera_inside = match parent {
        None => true,
        Some(p) if ctx.arena.get(p).camera_inside => {
            let seg = &ctx.arena.get(key).segment;
            let (inside, pos) = if seg.projection == Projection::Mercator
                && fv.camera.lon_lat.lat.abs() <= MAX_MERC_LAT
            {
                (seg.extent.is_inside(&fv.camera.lon_lat_merc), fv.camera.lon_lat_merc)
            } else {
                (seg.extent_lonlat.is_inside(&fv.camera.lon_lat), fv.camera.lon_lat)
            };
            if inside {
                fv.state.inside_segment = Some(key);
                fv.state.inside_position = Some(pos);
            }
            inside
        }
        Some(_) => false,
    };
    ctx.arena.get_mut(key).camera_inside = camera_inside;

    let (in_frustum, alt_vis, h, zoom, normal_map_ready, accepted) = {
        let seg = &ctx.arena.get(key).segment;
        let h = fv.camera.altitude();
        let in_frustum = fv
            .camera
            .frustum
            .contains_sphere(seg.bsphere.center, seg.bsphere.radius);
        let alt_vis = fv.camera.eye.distance(seg.bsphere.center) - seg.bsphere.radius
            < ctx.visible_distance * h.max(0.0).sqrt();
        let accepted = match fv.max_zoom {
            Some(mz) => seg.tile_zoom == mz,
            None => seg.accept_for_rendering(fv.camera, ctx.lod_size),
        };
        (in_frustum, alt_vis, h, seg.tile_zoom, seg.normal_map_ready, accepted)
    };
    let _under_bottom = false; // near-ground hook, intentionally inert

    if in_frustum || camera_inside {
        if zoom < 2 && normal_map_ready {
            // force-split the coarsest levels so polar seams never show
            traverse_nodes(ctx, fv, key);
        } else if accepted {
            prepare_for_rendering(ctx, fv, key, h, alt_vis);
        } else if zoom < ctx.terrain.max_node_zoom() {
            traverse_nodes(ctx, fv, key);
        } else {
            prepare_for_rendering(ctx, fv, key, h, alt_vis);
        }
    } else {
        ctx.arena.get_mut(key).state = Some(TraversalState::NotRendering);
    }

    if in_frustum && (alt_vis || h > HIGH_ALTITUDE) {
        let node = ctx.arena.get(key);
        let extent = node.segment.extent_lonlat;
        fv.state.collect_render_node(key, &extent);
    }
}

/// Ensure children exist and recurse into all four.
fn traverse_nodes(ctx: &mut TreeContext, fv: &mut FrameView, key: NodeKey) {
    if !ctx.arena.get(key).ready {
        create_children_nodes(ctx, key);
    }
    let children = ctx.arena.get(key).children;
    for child in children.into_iter().flatten() {
        render_tree(ctx, fv, child);
    }
}

/// Near-field rule: close to the ground only horizon-visible nodes render;
/// from high up everything in the frustum does.
pub fn prepare_for_rendering(ctx: &mut TreeContext, fv: &mut FrameView, key: NodeKey, h: f64, alt_vis: bool) {
    if h < NEAR_ALTITUDE {
        if alt_vis {
            render_node(ctx, fv, key);
        } else {
            ctx.arena.get_mut(key).state = Some(TraversalState::NotRendering);
        }
    } else {
        render_node(ctx, fv, key);
    }
}

/// Make the node drawable this frame: kick terrain loading behind
/// inherited data, keep the normal map flowing, and register for
/// rendering.
pub fn render_node(ctx: &mut TreeContext, fv: &mut FrameView, key: NodeKey) {
    let terrain_ready = ctx.arena.get(key).segment.terrain_ready;
    if !terrain_ready && while_terrain_loading(ctx, key) {
        let node = ctx.arena.get_mut(key);
        let node_id = node.node_id;
        node.segment
            .load_terrain(key, node_id, ctx.terrain, ctx.terrain_source);
    }

    if fv.only_terrain {
        ctx.arena.get_mut(key).state = Some(TraversalState::NotRendering);
        return;
    }

    let (normal_map_ready, parent_normal_map_ready) = {
        let seg = &ctx.arena.get(key).segment;
        (seg.normal_map_ready, seg.parent_normal_map_ready)
    };
    if ctx.light_enabled && !normal_map_ready && !parent_normal_map_ready {
        while_normal_map_creating(ctx, key);
    }

    ctx.arena
        .get_mut(key)
        .segment
        .ensure_coords_buffer(ctx.backend);
    add_to_render(ctx, fv, key);
}

/// Register in the frame's rendered list and negotiate seam tessellation
/// with every already-registered node sharing an edge. Newest entries are
/// scanned first; each side pairs up at most once per frame.
pub fn add_to_render(ctx: &mut TreeContext, fv: &mut FrameView, key: NodeKey) {
    ctx.arena.get_mut(key).state = Some(TraversalState::Rendering);

    for &other in fv.state.rendered.iter().rev() {
        let cs = {
            let a = ctx.arena.get(key);
            let b = ctx.arena.get(other);
            get_common_side(a, b)
        };
        let Some(cs) = cs else { continue };
        let op = cs.opposite();

        let (a, b) = ctx.arena.get_pair_mut(key, other);
        if a.has_neighbor[cs.index()] || b.has_neighbor[op.index()] {
            continue;
        }
        a.neighbors[cs.index()] = Some(other);
        a.has_neighbor[cs.index()] = true;
        b.neighbors[op.index()] = Some(key);
        b.has_neighbor[op.index()] = true;

        let ag = a.segment.grid_size;
        let bg = b.segment.grid_size;
        let ld = ag as f64
            / (bg as f64 * 2f64.powi(b.segment.tile_zoom as i32 - a.segment.tile_zoom as i32));
        if ld > 1.0 {
            a.side_size[cs.index()] = (ag as f64 / ld).ceil() as u32;
            b.side_size[op.index()] = bg;
        } else if ld < 1.0 {
            a.side_size[cs.index()] = ag;
            b.side_size[op.index()] = (bg as f64 * ld).ceil() as u32;
        } else {
            a.side_size[cs.index()] = ag;
            b.side_size[op.index()] = bg;
        }
    }

    let zoom = ctx.arena.get(key).segment.tile_zoom;
    fv.state.rendered.push(key);
    fv.state.max_curr_zoom = fv.state.max_curr_zoom.max(zoom);
    fv.state.min_curr_zoom = fv.state.min_curr_zoom.min(zoom);
}

/// The side of `a` shared with `b`, if their lon/lat extents touch along
/// a full edge. Comparisons are exact: subdivision arithmetic produces
/// bitwise-equal edge coordinates, and an epsilon here would break
/// neighbor symmetry.
pub fn get_common_side(a: &Node, b: &Node) -> Option<Side> {
    let ae = &a.segment.extent_lonlat;
    let be = &b.segment.extent_lonlat;
    let (a_n, a_s, a_e, a_w) = (
        ae.north_east.lat,
        ae.south_west.lat,
        ae.north_east.lon,
        ae.south_west.lon,
    );
    let (b_n, b_s, b_e, b_w) = (
        be.north_east.lat,
        be.south_west.lat,
        be.north_east.lon,
        be.south_west.lon,
    );

    if (a_n <= b_n && a_s >= b_s) || (a_n >= b_n && a_s <= b_s) {
        if a_e == b_w {
            return Some(Side::East);
        }
        if a_w == b_e {
            return Some(Side::West);
        }
        if a.segment.tile_zoom > 0 {
            if a_e == POLE && b_w == -POLE {
                return Some(Side::East);
            }
            if a_w == -POLE && b_e == POLE {
                // antimeridian wrap; resolves east like the branch above
                return Some(Side::East);
            }
        }
    } else if (a_e <= b_e && a_w >= b_w) || (a_e >= b_e && a_w <= b_w) {
        if a_n == b_s {
            return Some(Side::North);
        }
        if a_s == b_n {
            return Some(Side::South);
        }
        if a_n == POLE && b_s == MAX_MERC_LAT {
            return Some(Side::North);
        }
        if a_s == -POLE && b_n == -MAX_MERC_LAT {
            return Some(Side::South);
        }
    }
    None
}

/// Same-parent test; nodes qualify only when both hang off one parent.
pub fn is_brother(arena: &NodeArena, a: NodeKey, b: NodeKey) -> bool {
    match (arena.get(a).parent, arena.get(b).parent) {
        (Some(pa), Some(pb)) => pa == pb,
        _ => false,
    }
}

/// Same-depth neighbor across `side` found through the tree alone: climb
/// until a sibling step exists, then mirror the recorded path down the
/// neighbor subtree. Returns the deepest available node at the boundary
/// when the neighbor subtree is shallower.
pub fn get_equal_neighbor(arena: &NodeArena, key: NodeKey, side: Side) -> Option<NodeKey> {
    let node = arena.get(key);
    if let Some(part) = NEIGHBOUR[side.index()][node.part_id.index()] {
        return node
            .parent
            .and_then(|p| arena.get(p).children[part.index()]);
    }

    let mut path: Vec<Quadrant> = Vec::new();
    let mut cur = key;
    loop {
        let n = arena.get(cur);
        let parent = n.parent?;
        path.push(n.part_id);
        let hit = NEIGHBOUR[side.index()][n.part_id.index()];
        cur = parent;
        if hit.is_some() {
            break;
        }
    }

    // mirror the path across the shared edge and replay it downward
    let mirror = side.opposite();
    let mut pn = cur;
    for &part in path.iter().rev() {
        let next = arena.get(pn).children[OPPART[mirror.index()][part.index()].index()];
        match next {
            Some(child) => pn = child,
            None => break,
        }
    }
    Some(pn)
}

/// Mask the missing terrain with ancestor data: extract a sub-mesh when
/// the ancestor grid is fine enough, otherwise synthesize a 2x2 patch
/// inside the single covering cell. Always returns `true`: the caller
/// proceeds with this node's own load.
pub fn while_terrain_loading(ctx: &mut TreeContext, key: NodeKey) -> bool {
    if !ctx.arena.get(key).segment.ready {
        let ellipsoid = *ctx.ellipsoid;
        let file_grid = ctx.terrain.file_grid_size;
        ctx.arena
            .get_mut(key)
            .segment
            .create_plain_segment(&ellipsoid, file_grid);
    }

    let Some(anc) = find_ancestor(ctx.arena, key, |n| n.segment.terrain_ready) else {
        return true;
    };

    let (a_id, a_zoom, a_exists) = {
        let n = ctx.arena.get(anc);
        (n.node_id, n.segment.tile_zoom, n.segment.terrain_exists)
    };
    let (zoom, tile_x, tile_y, applied) = {
        let n = ctx.arena.get(key);
        (
            n.segment.tile_zoom,
            n.segment.tile_x,
            n.segment.tile_y,
            n.applied_terrain_node_id,
        )
    };
    let dz2 = 1u32 << (zoom - a_zoom);

    if a_exists && applied != a_id {
        let (a_grid, a_x, a_y) = {
            let s = &ctx.arena.get(anc).segment;
            (s.grid_size, s.tile_x, s.tile_y)
        };
        let off_x = tile_x - a_x * dz2;
        let off_y = tile_y - a_y * dz2;

        if a_grid >= dz2 {
            let sub = a_grid / dz2;
            let file_grid = ctx.terrain.file_grid_size;
            let (vertices, normals) = {
                let aseg = &ctx.arena.get(anc).segment;
                let vertices =
                    sub_matrix(&aseg.terrain_vertices, a_grid, sub * off_y, sub * off_x, sub);
                let normals = if file_grid >= dz2 {
                    let fsub = file_grid / dz2;
                    let expect = 3 * ((file_grid + 1) * (file_grid + 1)) as usize;
                    (aseg.normal_map_normals.len() == expect).then(|| {
                        sub_matrix(
                            &aseg.normal_map_normals,
                            file_grid,
                            fsub * off_y,
                            fsub * off_x,
                            fsub,
                        )
                    })
                } else {
                    None
                };
                (vertices, normals)
            };

            let node = ctx.arena.get_mut(key);
            node.segment.delete_buffers(ctx.backend);
            node.segment.refresh_indexes_buffer = true;
            node.segment.grid_size = sub;
            node.side_size = [sub; 4];
            node.segment.inherited_vertices = vertices;
            if let Some(normals) = normals {
                node.segment.normal_map_normals = normals;
            }
            node.segment.ensure_coords_buffer(ctx.backend);
            node.applied_terrain_node_id = a_id;
        } else {
            // one ancestor cell covers several tiles this deep; the 2x2
            // patch comes from the cell's own triangle pair
            let inside = dz2 / a_grid;
            let i0 = off_y / inside;
            let j0 = off_x / inside;
            let vi_x = (off_x - j0 * inside) as f64;
            let vi_y = (off_y - i0 * inside) as f64;
            let corners = {
                let aseg = &ctx.arena.get(anc).segment;
                let patch = cell_patch(&aseg.terrain_vertices, a_grid, i0, j0);
                [
                    interp_in_cell(&patch, vi_x, vi_y, inside as f64),
                    interp_in_cell(&patch, vi_x + 1.0, vi_y, inside as f64),
                    interp_in_cell(&patch, vi_x, vi_y + 1.0, inside as f64),
                    interp_in_cell(&patch, vi_x + 1.0, vi_y + 1.0, inside as f64),
                ]
            };
            let mut vertices = Vec::with_capacity(12);
            for p in corners {
                vertices.extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
            }

            let node = ctx.arena.get_mut(key);
            node.segment.delete_buffers(ctx.backend);
            node.segment.refresh_indexes_buffer = true;
            node.segment.grid_size = 1;
            node.side_size = [1; 4];
            node.segment.inherited_vertices = vertices;
            node.segment.ensure_coords_buffer(ctx.backend);
            node.applied_terrain_node_id = a_id;
        }
    }

    if zoom > ctx.terrain.max_zoom {
        if a_zoom >= ctx.terrain.max_zoom {
            // the source will never serve this depth; adopt the
            // synthesized mesh as terrain and stop loading forever
            let node = ctx.arena.get_mut(key);
            let seg = &mut node.segment;
            seg.terrain_vertices = if seg.inherited_vertices.is_empty() {
                seg.plain_vertices.clone()
            } else {
                seg.inherited_vertices.clone()
            };
            seg.normal_map_normals_raw = seg.normal_map_normals.clone();
            seg.terrain_ready = true;
            seg.terrain_is_loading = false;
            seg.terrain_exists = a_exists;
        } else if let Some(pm) =
            find_ancestor(ctx.arena, key, |n| n.segment.tile_zoom == ctx.terrain.max_zoom)
        {
            // pull the deepest loadable ancestor in instead
            let ellipsoid = *ctx.ellipsoid;
            let file_grid = ctx.terrain.file_grid_size;
            let node = ctx.arena.get_mut(pm);
            if !node.segment.ready {
                node.segment.create_plain_segment(&ellipsoid, file_grid);
            }
            let node_id = node.node_id;
            node.segment
                .load_terrain(pm, node_id, ctx.terrain, ctx.terrain_source);
        }
    }

    true
}

/// Keep the normal map flowing: enqueue own generation once terrain is
/// in, and until the texture lands sample the nearest ready ancestor's
/// map through a bias triple.
pub fn while_normal_map_creating(ctx: &mut TreeContext, key: NodeKey) {
    let (zoom, terrain_ready, terrain_is_loading, in_queue, node_id) = {
        let n = ctx.arena.get(key);
        (
            n.segment.tile_zoom,
            n.segment.terrain_ready,
            n.segment.terrain_is_loading,
            n.segment.in_the_queue,
            n.node_id,
        )
    };

    if zoom <= ctx.terrain.max_zoom && terrain_ready && !terrain_is_loading && !in_queue {
        let node = ctx.arena.get_mut(key);
        node.segment.in_the_queue = true;
        let normals = node.segment.normal_map_normals.clone();
        ctx.normal_maps.queue(NormalMapRequest {
            key,
            node_id,
            normals,
        });
    }

    let anc = find_ancestor(ctx.arena, key, |n| n.segment.normal_map_ready);
    let mut anc_zoom = None;
    if let Some(p) = anc {
        let (texture, p_zoom, p_x, p_y) = {
            let s = &ctx.arena.get(p).segment;
            (s.normal_map_texture, s.tile_zoom, s.tile_x, s.tile_y)
        };
        anc_zoom = Some(p_zoom);
        let dz2 = 1u32 << (zoom - p_zoom);
        let node = ctx.arena.get_mut(key);
        node.segment.normal_map_texture = texture;
        node.segment.normal_map_texture_bias = [
            (node.segment.tile_x - p_x * dz2) as f32,
            (node.segment.tile_y - p_y * dz2) as f32,
            1.0 / dz2 as f32,
        ];
    }

    if zoom > ctx.terrain.max_zoom {
        if anc_zoom == Some(ctx.terrain.max_zoom) {
            ctx.arena.get_mut(key).segment.parent_normal_map_ready = true;
        } else if let Some(pm) =
            find_ancestor(ctx.arena, key, |n| n.segment.tile_zoom == ctx.terrain.max_zoom)
        {
            // drive the deepest loadable ancestor all the way to a map
            let ellipsoid = *ctx.ellipsoid;
            let file_grid = ctx.terrain.file_grid_size;
            let node = ctx.arena.get_mut(pm);
            if !node.segment.ready {
                node.segment.create_plain_segment(&ellipsoid, file_grid);
            }
            let pm_id = node.node_id;
            node.segment
                .load_terrain(pm, pm_id, ctx.terrain, ctx.terrain_source);
            let node = ctx.arena.get_mut(pm);
            if node.segment.terrain_ready && !node.segment.terrain_is_loading && !node.segment.in_the_queue
            {
                node.segment.in_the_queue = true;
                let normals = node.segment.normal_map_normals.clone();
                ctx.normal_maps.queue(NormalMapRequest {
                    key: pm,
                    node_id: pm_id,
                    normals,
                });
            }
        }
    }
}

/// Effective traversal state: any ancestor that stopped walking makes the
/// whole subtree effectively not rendered.
pub fn get_state(arena: &NodeArena, key: NodeKey) -> Option<TraversalState> {
    let mut cur = arena.get(key).parent;
    while let Some(p) = cur {
        let n = arena.get(p);
        if n.state != Some(TraversalState::Walkthrough) {
            return Some(TraversalState::NotRendering);
        }
        cur = n.parent;
    }
    arena.get(key).state
}

/// Drop subtrees below any node whose effective state stopped the walk;
/// keep recursing through live interior nodes.
pub fn clear_tree(ctx: &mut TreeContext, key: NodeKey) {
    match get_state(ctx.arena, key) {
        Some(TraversalState::NotRendering) | Some(TraversalState::Rendering) => {
            destroy_branches(ctx, key);
        }
        _ => {
            let children = ctx.arena.get(key).children;
            for child in children.into_iter().flatten() {
                clear_tree(ctx, child);
            }
        }
    }
}

/// Release imagery materials throughout the subtree, keeping geometry.
pub fn clear_branches(ctx: &mut TreeContext, key: NodeKey) {
    let children = ctx.arena.get(key).children;
    for child in children.into_iter().flatten() {
        clear_branches(ctx, child);
        ctx.arena.get_mut(child).segment.delete_materials();
    }
}

/// Detach and destroy all four child subtrees.
pub fn destroy_branches(ctx: &mut TreeContext, key: NodeKey) {
    let children = {
        let node = ctx.arena.get_mut(key);
        if !node.ready {
            return;
        }
        node.ready = false;
        let mut taken = [None; 4];
        std::mem::swap(&mut taken, &mut node.children);
        taken
    };
    for child in children.into_iter().flatten() {
        destroy_branches(ctx, child);
        destroy(ctx, child);
    }
}

/// Tear one node down: release segment resources, unlink the four
/// neighbor back-pointers symmetrically, free the arena slot.
pub fn destroy(ctx: &mut TreeContext, key: NodeKey) {
    ctx.arena.get_mut(key).state = Some(TraversalState::NotRendering);

    let neighbors = ctx.arena.get(key).neighbors;
    for side in Side::ALL {
        if let Some(nk) = neighbors[side.index()] {
            if let Some(n) = ctx.arena.try_get_mut(nk) {
                let op = side.opposite().index();
                if n.neighbors[op] == Some(key) {
                    n.neighbors[op] = None;
                    n.has_neighbor[op] = false;
                }
            }
        }
    }

    if let Some(mut node) = ctx.arena.remove(key) {
        node.segment.destroy_segment(ctx.backend);
        debug!(
            "destroyed node {} at tile {:?}",
            node.node_id,
            node.segment.tile()
        );
    }
}

/// Visit this node, then every populated descendant.
pub fn traverse_tree(arena: &NodeArena, key: NodeKey, visit: &mut impl FnMut(NodeKey, &Node)) {
    let node = arena.get(key);
    visit(key, node);
    if node.ready {
        let children = node.children;
        for child in children.into_iter().flatten() {
            traverse_tree(arena, child, visit);
        }
    }
}
