//! A single quadtree tile: extent, tile address, bounding sphere, mesh
//! arrays, terrain readiness state machine, and normal-map plumbing.

pub mod mesh;

use glam::DVec3;
use log::warn;

use crate::error::{GlobeError, GlobeResult};
use crate::geo::{BoundingSphere, Ellipsoid, Extent, LonLat, Projection};
use crate::render::{BufferHandle, MaterialHandle, RenderBackend, TextureHandle};
use crate::terrain::{TerrainData, TerrainRequest, TerrainSource, TerrainSpec, TileIndex};

/// Camera data a segment needs for its LOD acceptance test.
pub trait LodCamera {
    /// Projected on-screen size in pixels of a sphere of `diameter`
    /// world units at `center`.
    fn projected_size(&self, center: DVec3, diameter: f64) -> f64;
}

/// One tile of the planet surface.
///
/// Terrain progresses `Empty -> PlainReady -> { Loading -> Ready }` via
/// the flag set below; the owning node masks the gap with ancestor data.
#[derive(Debug)]
pub struct Segment {
    pub projection: Projection,
    pub tile_zoom: u32,
    pub tile_x: u32,
    pub tile_y: u32,
    /// Extent in projection units (mercator meters or degrees).
    pub extent: Extent,
    /// The same extent in lon/lat degrees.
    pub extent_lonlat: Extent,
    pub bsphere: BoundingSphere,
    /// Per-side tessellation of the current mesh.
    pub grid_size: u32,

    /// Ellipsoid-surface mesh, available once the plain segment is built.
    pub plain_vertices: Vec<f32>,
    /// Own elevated mesh; filled only when `terrain_ready`.
    pub terrain_vertices: Vec<f32>,
    /// Mesh synthesized from an ancestor while terrain is loading.
    pub inherited_vertices: Vec<f32>,
    /// Working normals handed to the normal-map worker.
    pub normal_map_normals: Vec<f32>,
    /// Own raw normals at file-grid resolution.
    pub normal_map_normals_raw: Vec<f32>,

    /// Plain segment materialized.
    pub ready: bool,
    pub terrain_ready: bool,
    pub terrain_is_loading: bool,
    /// Real data existed in the source (vs. plain ellipsoid only).
    pub terrain_exists: bool,
    pub normal_map_ready: bool,
    pub parent_normal_map_ready: bool,
    /// Awaiting the normal-map worker; guards re-enqueue.
    pub in_the_queue: bool,
    pub refresh_indexes_buffer: bool,

    pub normal_map_texture: Option<TextureHandle>,
    /// (u offset, v offset, scale) selecting the subregion of an
    /// ancestor's normal map that covers this tile.
    pub normal_map_texture_bias: [f32; 3],
    pub coords_buffer: Option<BufferHandle>,
    pub materials: Vec<MaterialHandle>,
}

impl Segment {
    pub fn new(projection: Projection, extent: Extent, tile_zoom: u32, terrain: &TerrainSpec) -> Self {
        let full = projection.full_extent();
        let (tile_x, tile_y) = if tile_zoom == 0 {
            (0, 0)
        } else {
            (
                ((extent.south_west.lon - full.south_west.lon) / extent.width()).round() as u32,
                ((full.north_east.lat - extent.north_east.lat) / extent.height()).round() as u32,
            )
        };
        Self {
            projection,
            tile_zoom,
            tile_x,
            tile_y,
            extent,
            extent_lonlat: projection.extent_to_lonlat(&extent),
            bsphere: BoundingSphere::default(),
            grid_size: terrain.grid_size(tile_zoom),
            plain_vertices: Vec::new(),
            terrain_vertices: Vec::new(),
            inherited_vertices: Vec::new(),
            normal_map_normals: Vec::new(),
            normal_map_normals_raw: Vec::new(),
            ready: false,
            terrain_ready: false,
            terrain_is_loading: false,
            terrain_exists: false,
            normal_map_ready: false,
            parent_normal_map_ready: false,
            in_the_queue: false,
            refresh_indexes_buffer: false,
            normal_map_texture: None,
            normal_map_texture_bias: [0.0, 0.0, 1.0],
            coords_buffer: None,
            materials: Vec::new(),
        }
    }

    pub fn tile(&self) -> TileIndex {
        TileIndex::new(self.tile_zoom, self.tile_x, self.tile_y)
    }

    /// Refresh `extent_lonlat` after an extent change.
    pub fn set_extent_lonlat(&mut self) {
        self.extent_lonlat = self.projection.extent_to_lonlat(&self.extent);
    }

    /// The lon/lat of a mesh grid position, row `i` from the north edge.
    fn grid_lonlat(&self, i: u32, j: u32, grid: u32) -> LonLat {
        let e = &self.extent;
        let p = LonLat::new(
            e.south_west.lon + e.width() * j as f64 / grid as f64,
            e.north_east.lat - e.height() * i as f64 / grid as f64,
            0.0,
        );
        self.projection.point_to_lonlat(&p)
    }

    /// Materialize the ellipsoid-only mesh and its raw normals.
    pub fn create_plain_segment(&mut self, ellipsoid: &Ellipsoid, file_grid_size: u32) {
        let grid = self.grid_size.max(1);
        let mut vertices = Vec::with_capacity(3 * ((grid + 1) * (grid + 1)) as usize);
        for i in 0..=grid {
            for j in 0..=grid {
                let p = ellipsoid.lonlat_to_cartesian(&self.grid_lonlat(i, j, grid));
                vertices.extend_from_slice(&[p.x as f32, p.y as f32, p.z as f32]);
            }
        }
        let fgrid = file_grid_size.max(1);
        let mut normals = Vec::with_capacity(3 * ((fgrid + 1) * (fgrid + 1)) as usize);
        for i in 0..=fgrid {
            for j in 0..=fgrid {
                let n = ellipsoid.geodetic_normal(&self.grid_lonlat(i, j, fgrid));
                normals.extend_from_slice(&[n.x as f32, n.y as f32, n.z as f32]);
            }
        }
        self.plain_vertices = vertices;
        self.normal_map_normals_raw = normals.clone();
        self.normal_map_normals = normals;
        self.ready = true;
    }

    /// Fit the bounding sphere from extent geometry alone: the ellipsoid
    /// surface sampled at corners, edge midpoints, and center.
    pub fn create_bounds_by_extent(&mut self, ellipsoid: &Ellipsoid) {
        let e = &self.extent_lonlat;
        let mut points = Vec::with_capacity(9);
        for i in 0..3 {
            for j in 0..3 {
                let ll = LonLat::new(
                    e.south_west.lon + e.width() * j as f64 * 0.5,
                    e.south_west.lat + e.height() * i as f64 * 0.5,
                    0.0,
                );
                points.push(ellipsoid.lonlat_to_cartesian(&ll));
            }
        }
        self.bsphere = BoundingSphere::from_points(&points);
    }

    /// The mesh the renderer should draw right now: own terrain when
    /// ready, else the ancestor-derived mesh, else the plain ellipsoid.
    pub fn current_vertices(&self) -> &[f32] {
        if self.terrain_ready && !self.terrain_vertices.is_empty() {
            &self.terrain_vertices
        } else if !self.inherited_vertices.is_empty() {
            &self.inherited_vertices
        } else {
            &self.plain_vertices
        }
    }

    /// Whether the node is fine enough on screen to stop splitting.
    pub fn accept_for_rendering(&self, camera: &dyn LodCamera, lod_size: f64) -> bool {
        camera.projected_size(self.bsphere.center, self.bsphere.radius * 2.0) < lod_size
    }

    /// Kick a terrain request if this tile is in the loadable band and
    /// idle. Below `min_zoom` the plain mesh is the terrain; above
    /// `max_zoom` loads happen on the deepest loadable ancestor instead.
    pub fn load_terrain(&mut self, key: crate::quadtree::NodeKey, node_id: i64, terrain: &TerrainSpec, source: &mut dyn TerrainSource) {
        if self.terrain_ready || self.terrain_is_loading || !self.ready {
            return;
        }
        if self.tile_zoom < terrain.min_zoom {
            self.terrain_vertices = self.plain_vertices.clone();
            self.terrain_ready = true;
            self.terrain_exists = false;
            return;
        }
        if self.tile_zoom > terrain.max_zoom {
            return;
        }
        self.terrain_is_loading = true;
        // the natural grid for this zoom, not a coarser inherited one
        source.request(TerrainRequest {
            key,
            node_id,
            tile: self.tile(),
            grid_size: terrain.grid_size(self.tile_zoom),
        });
    }

    /// Apply a terrain completion. An empty payload resolves the tile to
    /// its plain mesh with `terrain_exists = false`.
    pub fn terrain_received(
        &mut self,
        data: Option<TerrainData>,
        backend: &mut dyn RenderBackend,
    ) -> GlobeResult<()> {
        self.terrain_is_loading = false;
        match data {
            Some(data) => {
                let expect = 3 * ((data.grid_size + 1) * (data.grid_size + 1)) as usize;
                if data.vertices.len() != expect {
                    return Err(GlobeError::terrain(format!(
                        "tile {:?}: payload has {} floats, expected {}",
                        self.tile(),
                        data.vertices.len(),
                        expect
                    )));
                }
                self.delete_buffers(backend);
                self.refresh_indexes_buffer = true;
                self.grid_size = data.grid_size;
                let points: Vec<DVec3> = mesh::as_points(&data.vertices)
                    .iter()
                    .map(|p| DVec3::new(p[0] as f64, p[1] as f64, p[2] as f64))
                    .collect();
                self.bsphere = BoundingSphere::from_points(&points);
                self.terrain_vertices = data.vertices;
                if let Some(normals) = data.normals {
                    self.normal_map_normals_raw = normals.clone();
                    self.normal_map_normals = normals;
                }
                self.inherited_vertices.clear();
                self.terrain_exists = true;
            }
            None => {
                // back to the plain mesh; undo any inherited coarsening so
                // grid_size matches the vertex array again
                if !self.inherited_vertices.is_empty() {
                    self.delete_buffers(backend);
                    self.refresh_indexes_buffer = true;
                    self.inherited_vertices.clear();
                }
                let side = (self.plain_vertices.len() / 3) as f64;
                self.grid_size = (side.sqrt().round() as u32).saturating_sub(1);
                self.terrain_vertices = self.plain_vertices.clone();
                self.terrain_exists = false;
            }
        }
        self.terrain_ready = true;
        Ok(())
    }

    /// Upload the current mesh if the backend holds no buffer for it.
    pub fn ensure_coords_buffer(&mut self, backend: &mut dyn RenderBackend) {
        if self.coords_buffer.is_none() && !self.current_vertices().is_empty() {
            let grid = self.grid_size;
            let handle = backend.create_coords_buffer(self.current_vertices(), grid);
            self.coords_buffer = Some(handle);
        }
    }

    pub fn delete_buffers(&mut self, backend: &mut dyn RenderBackend) {
        if let Some(handle) = self.coords_buffer.take() {
            backend.delete_buffer(handle);
        }
    }

    /// Release imagery materials, keeping geometry.
    pub fn delete_materials(&mut self) {
        self.materials.clear();
    }

    /// Full release on node destruction. The normal-map texture is only
    /// deleted when it is this segment's own; inherited handles belong to
    /// the ancestor.
    pub fn destroy_segment(&mut self, backend: &mut dyn RenderBackend) {
        self.delete_buffers(backend);
        self.delete_materials();
        if self.normal_map_ready {
            if let Some(tex) = self.normal_map_texture.take() {
                backend.delete_texture(tex);
            }
        }
        self.normal_map_texture = None;
        self.plain_vertices = Vec::new();
        self.terrain_vertices = Vec::new();
        self.inherited_vertices = Vec::new();
        self.normal_map_normals = Vec::new();
        self.normal_map_normals_raw = Vec::new();
        self.ready = false;
        self.terrain_ready = false;
        if self.terrain_is_loading {
            // the in-flight completion will be discarded by the id guard
            warn!(
                "segment {:?} destroyed with terrain in flight",
                self.tile()
            );
            self.terrain_is_loading = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::MAX_MERC_LAT;

    fn spec() -> TerrainSpec {
        TerrainSpec {
            min_zoom: 1,
            max_zoom: 10,
            file_grid_size: 4,
            grid_size_by_zoom: vec![4; 12],
        }
    }

    #[test]
    fn test_tile_coords_from_extent() {
        // second column, first row of the 4326 z1 grid
        let e = Extent::from_degrees(-90.0, 0.0, 0.0, 90.0);
        let seg = Segment::new(Projection::Geographic, e, 1, &spec());
        assert_eq!(seg.tile_x, 1);
        assert_eq!(seg.tile_y, 0);

        let root = Segment::new(Projection::Mercator, Extent::full_mercator(), 0, &spec());
        assert_eq!((root.tile_x, root.tile_y), (0, 0));
    }

    #[test]
    fn test_mercator_extent_lonlat() {
        let seg = Segment::new(Projection::Mercator, Extent::full_mercator(), 0, &spec());
        assert!((seg.extent_lonlat.north_east.lat - MAX_MERC_LAT).abs() < 1e-9);
        assert!((seg.extent_lonlat.south_west.lon + 180.0).abs() < 1e-9);
    }

    #[test]
    fn test_set_extent_lonlat_follows_extent() {
        let mut seg = Segment::new(Projection::Mercator, Extent::full_mercator(), 0, &spec());
        seg.extent = Extent::full_mercator().quadrant(crate::quadtree::Quadrant::SouthWest);
        seg.set_extent_lonlat();
        assert!((seg.extent_lonlat.north_east.lon - 0.0).abs() < 1e-9);
        assert!((seg.extent_lonlat.north_east.lat - 0.0).abs() < 1e-9);
        assert!((seg.extent_lonlat.south_west.lat + MAX_MERC_LAT).abs() < 1e-9);
    }

    #[test]
    fn test_plain_segment_lies_on_ellipsoid() {
        let e = Extent::from_degrees(0.0, 0.0, 45.0, 45.0);
        let mut seg = Segment::new(Projection::Geographic, e, 2, &spec());
        seg.create_plain_segment(&Ellipsoid::WGS84, 4);
        assert!(seg.ready);
        assert_eq!(seg.plain_vertices.len(), 3 * 25);

        // north-west grid corner is the extent's north-west corner
        let nw = mesh::grid_point(&seg.plain_vertices, 4, 0, 0);
        let expect = Ellipsoid::WGS84.lonlat_to_cartesian(&LonLat::new(0.0, 45.0, 0.0));
        assert!((nw - expect).length() < 1.0, "corner off by {}", (nw - expect).length());
    }

    #[test]
    fn test_bounds_by_extent_encloses_corners() {
        let e = Extent::from_degrees(-10.0, -10.0, 10.0, 10.0);
        let mut seg = Segment::new(Projection::Geographic, e, 1, &spec());
        seg.create_bounds_by_extent(&Ellipsoid::WGS84);
        for lon in [-10.0, 10.0] {
            for lat in [-10.0, 10.0] {
                let p = Ellipsoid::WGS84.lonlat_to_cartesian(&LonLat::new(lon, lat, 0.0));
                assert!(seg.bsphere.center.distance(p) <= seg.bsphere.radius + 1e-6);
            }
        }
    }

    #[test]
    fn test_load_terrain_below_min_zoom_resolves_plain() {
        let e = Extent::full_geographic();
        let mut seg = Segment::new(Projection::Geographic, e, 0, &spec());
        seg.create_plain_segment(&Ellipsoid::WGS84, 4);
        let mut source = crate::terrain::source::EmptyTerrainSource::default();
        seg.load_terrain(crate::quadtree::NodeKey::from_raw(0), 0, &spec(), &mut source);
        assert!(seg.terrain_ready);
        assert!(!seg.terrain_exists);
        assert!(!seg.terrain_is_loading);
        assert!(source.poll_completed().is_empty());
    }

    #[test]
    fn test_terrain_received_rejects_bad_payload() {
        let e = Extent::from_degrees(0.0, 0.0, 1.0, 1.0);
        let mut seg = Segment::new(Projection::Geographic, e, 5, &spec());
        let mut backend = crate::render::NullBackend::new();
        let bad = TerrainData {
            vertices: vec![0.0; 10],
            grid_size: 4,
            normals: None,
        };
        assert!(seg.terrain_received(Some(bad), &mut backend).is_err());
        assert!(!seg.terrain_ready);
    }
}
