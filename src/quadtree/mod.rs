//! The dynamic spatial hierarchy: adjacency tables, node storage, and the
//! per-frame split/render/collapse algorithms.

pub mod arena;
pub mod node;
pub mod tables;

pub use arena::{NodeArena, NodeKey};
pub use node::{
    add_to_render, clear_branches, clear_tree, create_bounds, create_children_nodes, create_node,
    destroy, destroy_branches, get_common_side, get_equal_neighbor, get_state, is_brother,
    prepare_for_rendering, render_node, render_tree, traverse_tree, while_normal_map_creating,
    while_terrain_loading, FrameView, Node, TreeContext,
};
pub use tables::{
    Quadrant, Side, TraversalState, DEFAULT_LOD_SIZE, HIGH_ALTITUDE, NEAR_ALTITUDE, NEIGHBOUR,
    OPPART, OPSIDE, VISIBLE_DISTANCE,
};
