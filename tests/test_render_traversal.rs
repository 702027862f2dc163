//! End-to-end frame traversal over a full planet: uniform-zoom rendering,
//! neighbor symmetry, seam compatibility, quadrant coverage, state rules,
//! and subtree destruction between zoom changes.

use glam::DVec3;
use quadglobe::camera::{FrameCamera, Frustum};
use quadglobe::geo::{Ellipsoid, LonLat, Projection, MAX_MERC_LAT, POLE_MERC};
use quadglobe::planet::{Planet, PlanetOptions};
use quadglobe::quadtree::{get_common_side, traverse_tree, Side, TraversalState};
use quadglobe::render::NullBackend;
use quadglobe::terrain::{ChannelTerrainSource, EmptyTerrainSource, QueueNormalMapCreator, TerrainSpec};

fn test_spec() -> TerrainSpec {
    TerrainSpec {
        min_zoom: 1,
        max_zoom: 3,
        file_grid_size: 8,
        grid_size_by_zoom: vec![8; 5],
    }
}

fn make_planet(max_zoom: Option<u32>) -> Planet {
    let options = PlanetOptions {
        terrain: test_spec(),
        light_enabled: false,
        max_zoom,
        ..Default::default()
    };
    Planet::new(
        options,
        Box::new(NullBackend::new()),
        Box::new(EmptyTerrainSource::default()),
        Box::new(QueueNormalMapCreator::new()),
    )
    .expect("valid planet options")
}

fn high_camera() -> FrameCamera {
    FrameCamera::new(
        DVec3::new(16_378_137.0, 0.0, 0.0),
        LonLat::new(0.0, 0.0, 10_000_000.0),
        768.0,
        45f64.to_radians(),
        Frustum::infinite(),
    )
}

#[test]
fn test_uniform_zoom_frame_accounting() {
    let mut planet = make_planet(Some(2));
    planet.render_frame(&high_camera());

    // 16 tiles per tree at zoom 2: mercator plus two polar caps
    assert_eq!(planet.rendered_nodes().len(), 48);
    for &key in planet.rendered_nodes() {
        let node = planet.node(key);
        assert_eq!(node.segment.tile_zoom, 2);
        assert_eq!(node.state, Some(TraversalState::Rendering));
    }
    assert_eq!(planet.min_curr_zoom(), 2);
    assert_eq!(planet.max_curr_zoom(), 2);

    // 1 + 4 + 16 nodes per tree were created
    assert_eq!(planet.created_nodes_count(), 63);
    assert_eq!(planet.nodes().len(), 63);

    // layer collection saw everything the frustum saw
    assert!(!planet.frame().layer_nodes.is_empty());
    assert!(planet.frame().view_extent.is_some());
}

#[test]
fn test_neighbor_symmetry_and_seam_sizes() {
    let mut planet = make_planet(Some(2));
    planet.render_frame(&high_camera());

    let mut pairs = 0usize;
    for &key in planet.rendered_nodes() {
        let node = planet.node(key);
        for side in Side::ALL {
            if let Some(other_key) = node.neighbors[side.index()] {
                pairs += 1;
                let other = planet.node(other_key);
                assert_eq!(
                    other.neighbors[side.opposite().index()],
                    Some(key),
                    "neighbor back-reference must mirror"
                );
                assert!(node.has_neighbor[side.index()]);
                assert!(other.has_neighbor[side.opposite().index()]);

                // seam sizes stay divisibility-compatible
                let a = node.side_size[side.index()];
                let b = other.side_size[side.opposite().index()];
                assert!(
                    a % b == 0 || b % a == 0,
                    "side sizes {} / {} incompatible",
                    a,
                    b
                );
                // equal zoom means equal full-grid sides here
                assert_eq!(a, 8);
                assert_eq!(b, 8);
            }
        }
    }
    assert!(pairs > 0, "a full frame must produce adjacent pairs");
}

#[test]
fn test_cap_boundary_tiles_never_pair_with_mercator() {
    let mut planet = make_planet(Some(2));
    // camera right at the cap boundary latitude
    let eye_ll = LonLat::new(0.0, MAX_MERC_LAT, 10_000_000.0);
    let camera = FrameCamera::new(
        Ellipsoid::WGS84.lonlat_to_cartesian(&eye_ll),
        eye_ll,
        768.0,
        45f64.to_radians(),
        Frustum::infinite(),
    );
    planet.render_frame(&camera);

    // the north cap's southern row and the mercator tree's northern row
    let rendered = planet.rendered_nodes().to_vec();
    let cap_row: Vec<_> = rendered
        .iter()
        .copied()
        .filter(|&k| {
            let s = &planet.node(k).segment;
            s.projection == Projection::Geographic
                && s.extent_lonlat.south_west.lat == MAX_MERC_LAT
        })
        .collect();
    let merc_row: Vec<_> = rendered
        .iter()
        .copied()
        .filter(|&k| {
            let s = &planet.node(k).segment;
            s.projection == Projection::Mercator && s.extent.north_east.lat == POLE_MERC
        })
        .collect();
    assert_eq!(cap_row.len(), 4);
    assert_eq!(merc_row.len(), 4);

    for &c in &cap_row {
        for &m in &merc_row {
            let cap = planet.node(c);
            let merc = planet.node(m);

            // the rows meet at the boundary, but the mercator edge comes
            // out of the inverse projection and misses the cap's literal
            // latitude by rounding, so the exact comparisons see no edge
            let cap_south = cap.segment.extent_lonlat.south_west.lat;
            let merc_north = merc.segment.extent_lonlat.north_east.lat;
            assert!((cap_south - merc_north).abs() < 1e-9);
            assert!(cap_south != merc_north);
            assert_eq!(get_common_side(cap, merc), None);
            assert_eq!(get_common_side(merc, cap), None);
        }
    }

    // consequently neither row acquires a neighbor across the boundary
    for &c in &cap_row {
        let cap = planet.node(c);
        assert_eq!(cap.neighbors[Side::South.index()], None);
        assert!(!cap.has_neighbor[Side::South.index()]);
    }
    for &m in &merc_row {
        let merc = planet.node(m);
        assert_eq!(merc.neighbors[Side::North.index()], None);
        assert!(!merc.has_neighbor[Side::North.index()]);
    }
}

#[test]
fn test_children_tile_the_parent_exactly() {
    let mut planet = make_planet(Some(2));
    planet.render_frame(&high_camera());

    for &root in &planet.roots().to_vec() {
        traverse_tree(planet.nodes(), root, &mut |_, node| {
            if !node.ready {
                return;
            }
            let parent_extent = node.segment.extent;
            let child = |q: quadglobe::Quadrant| {
                planet.node(node.children[q.index()].unwrap()).segment.extent
            };
            let nw = child(quadglobe::Quadrant::NorthWest);
            let ne = child(quadglobe::Quadrant::NorthEast);
            let sw = child(quadglobe::Quadrant::SouthWest);
            let se = child(quadglobe::Quadrant::SouthEast);

            // outer corners inherited bitwise
            assert_eq!(sw.south_west, parent_extent.south_west);
            assert_eq!(ne.north_east, parent_extent.north_east);
            assert_eq!(nw.south_west.lon, parent_extent.south_west.lon);
            assert_eq!(nw.north_east.lat, parent_extent.north_east.lat);
            assert_eq!(se.north_east.lon, parent_extent.north_east.lon);
            assert_eq!(se.south_west.lat, parent_extent.south_west.lat);

            // shared interior edges are bitwise equal: no cracks, no overlap
            assert_eq!(nw.north_east.lon, ne.south_west.lon);
            assert_eq!(sw.north_east.lon, se.south_west.lon);
            assert_eq!(nw.south_west.lat, sw.north_east.lat);
            assert_eq!(ne.south_west.lat, se.north_east.lat);
            assert_eq!(nw.north_east.lon, sw.north_east.lon);
            assert_eq!(nw.south_west.lat, ne.south_west.lat);

            // depth bookkeeping
            assert_eq!(
                planet
                    .node(node.children[0].unwrap())
                    .segment
                    .tile_zoom,
                node.segment.tile_zoom + 1
            );
        });
    }
}

#[test]
fn test_states_resolve_every_visited_node() {
    let mut planet = make_planet(Some(2));
    planet.render_frame(&high_camera());

    for &root in &planet.roots().to_vec() {
        traverse_tree(planet.nodes(), root, &mut |key, node| {
            match node.state {
                Some(TraversalState::Walkthrough) => {
                    // interior nodes delegated; every child made a decision
                    assert!(node.ready, "walkthrough node must have split");
                    for child in node.children.iter().flatten() {
                        assert!(planet.node(*child).state.is_some());
                    }
                }
                Some(TraversalState::Rendering) => {
                    assert!(planet.rendered_nodes().contains(&key));
                }
                Some(TraversalState::NotRendering) | None => {}
            }
        });
    }
}

#[test]
fn test_camera_inside_segment_tracked() {
    let mut planet = make_planet(Some(2));
    let camera = high_camera();
    planet.render_frame(&camera);

    let inside = planet.frame().inside_segment.expect("camera over the equator");
    let node = planet.node(inside);
    assert!(node.camera_inside);
    assert!(node.segment.extent_lonlat.is_inside(&camera.lon_lat));
    assert!(planet.frame().inside_position.is_some());
}

#[test]
fn test_zoom_coarsening_then_clear_destroys_subtrees() {
    let mut planet = make_planet(Some(3));
    planet.render_frame(&high_camera());
    assert_eq!(planet.rendered_nodes().len(), 3 * 64);
    assert_eq!(planet.nodes().len(), 3 * (1 + 4 + 16 + 64));

    // coarsen: only zoom 1 renders, deeper subtrees go stale
    planet.options_mut().max_zoom = Some(1);
    planet.render_frame(&high_camera());
    assert_eq!(planet.rendered_nodes().len(), 12);
    assert_eq!(planet.min_curr_zoom(), 1);

    // deep nodes keep last frame's own state, but their effective state
    // resolves through the now-rendering ancestor
    let z1 = planet.rendered_nodes()[0];
    let z2 = planet.node(z1).children[0].expect("frame 1 split this");
    let z3 = planet.node(z2).children[0].expect("frame 1 split this");
    assert_eq!(planet.node(z3).state, Some(TraversalState::Rendering));
    assert_eq!(planet.node_state(z3), Some(TraversalState::NotRendering));

    let created_before = planet.created_nodes_count();
    planet.clear_unused();
    // roots and the twelve rendered zoom-1 nodes survive
    assert_eq!(planet.nodes().len(), 15);
    assert_eq!(planet.created_nodes_count(), created_before);

    // the next frame still renders without recreating anything
    planet.render_frame(&high_camera());
    assert_eq!(planet.rendered_nodes().len(), 12);
    assert_eq!(planet.created_nodes_count(), created_before);
}

#[test]
fn test_only_terrain_pass_loads_without_registering() {
    let (source, req_rx, _resp_tx) = ChannelTerrainSource::new();
    let options = PlanetOptions {
        terrain: test_spec(),
        light_enabled: false,
        max_zoom: Some(1),
        ..Default::default()
    };
    let mut planet = Planet::new(
        options,
        Box::new(NullBackend::new()),
        Box::new(source),
        Box::new(QueueNormalMapCreator::new()),
    )
    .unwrap();

    planet.render_frame_with(&high_camera(), true);
    assert!(planet.rendered_nodes().is_empty());

    // all twelve zoom-1 tiles asked for terrain anyway
    let mut requests = 0;
    while req_rx.try_recv().is_ok() {
        requests += 1;
    }
    assert_eq!(requests, 12);
}

#[test]
fn test_adaptive_depth_without_zoom_override() {
    let mut planet = make_planet(None);
    let camera = high_camera();
    // several frames so empty-tile completions settle into the tree
    planet.render_frame(&camera);
    planet.render_frame(&camera);
    planet.render_frame(&camera);

    assert!(!planet.rendered_nodes().is_empty());
    let max_node_zoom = planet.terrain_spec().max_node_zoom();
    for &key in planet.rendered_nodes() {
        let node = planet.node(key);
        // every rendered node either met the screen-size threshold or hit
        // the bottom of the grid table
        assert!(
            node.segment.accept_for_rendering(&camera, 256.0)
                || node.segment.tile_zoom == max_node_zoom,
            "tile {:?} rendered while still too coarse",
            node.segment.tile()
        );
        assert!(node.segment.tile_zoom >= 1, "roots never render directly");
    }
    assert!(planet.min_curr_zoom() <= planet.max_curr_zoom());
}

#[test]
fn test_clear_layer_resources_drops_materials_only() {
    let mut planet = make_planet(Some(1));
    planet.render_frame(&high_camera());
    let key = planet.rendered_nodes()[0];
    planet
        .node_mut(key)
        .segment
        .materials
        .push(quadglobe::render::MaterialHandle(7));

    planet.clear_layer_resources();

    let node = planet.node(key);
    assert!(node.segment.materials.is_empty());
    assert!(node.segment.ready, "geometry survives material cleanup");
}

#[test]
fn test_full_teardown() {
    let mut planet = make_planet(Some(2));
    planet.render_frame(&high_camera());
    assert!(planet.nodes().len() > 0);
    planet.destroy();
    assert_eq!(planet.nodes().len(), 0);
    assert!(planet.roots().is_empty());
}
