// src/segment/mesh.rs
// Flat f32 vertex-grid views, sub-grid extraction, and the in-cell
// triangle interpolation used for bounds and inherited meshes.
// RELEVANT FILES: src/segment/mod.rs, src/quadtree/node.rs

use glam::DVec3;

/// `&[x,y,z, x,y,z, ...]` reinterpreted as grid points.
pub fn as_points(vertices: &[f32]) -> &[[f32; 3]] {
    bytemuck::cast_slice(vertices)
}

/// Grid point at (row `i` from the north edge, column `j` from the west
/// edge) of a `(grid + 1)^2` vertex array.
pub fn grid_point(vertices: &[f32], grid: u32, i: u32, j: u32) -> DVec3 {
    let p = as_points(vertices)[(i * (grid + 1) + j) as usize];
    DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64)
}

/// Extract the `(size + 1)^2` sub-grid with its north-west corner at
/// `(i0, j0)` from a `(grid + 1)^2` vertex array.
pub fn sub_matrix(vertices: &[f32], grid: u32, i0: u32, j0: u32, size: u32) -> Vec<f32> {
    let points = as_points(vertices);
    let row = (grid + 1) as usize;
    let mut out = Vec::with_capacity(3 * ((size + 1) * (size + 1)) as usize);
    for i in 0..=size {
        for j in 0..=size {
            let p = points[(i0 + i) as usize * row + (j0 + j) as usize];
            out.extend_from_slice(&p);
        }
    }
    out
}

/// The 2x2 corner patch of one grid cell: left-top, right-top,
/// left-bottom, right-bottom.
pub fn cell_patch(vertices: &[f32], grid: u32, i0: u32, j0: u32) -> [DVec3; 4] {
    [
        grid_point(vertices, grid, i0, j0),
        grid_point(vertices, grid, i0, j0 + 1),
        grid_point(vertices, grid, i0 + 1, j0),
        grid_point(vertices, grid, i0 + 1, j0 + 1),
    ]
}

/// Interpolate a point at `(vx, vy)` tile offsets inside a cell that spans
/// `inside` deeper tiles per axis. The cell is split along its
/// anti-diagonal into the two triangles the renderer draws, so points
/// synthesized here lie exactly on the coarse surface.
pub fn interp_in_cell(patch: &[DVec3; 4], vx: f64, vy: f64, inside: f64) -> DVec3 {
    let [lt, rt, lb, rb] = *patch;
    let fx = vx / inside;
    let fy = vy / inside;
    if vx + vy < inside {
        lt + (rt - lt) * fx + (lb - lt) * fy
    } else {
        rb + (rt - rb) * (1.0 - fy) + (lb - rb) * (1.0 - fx)
    }
}
