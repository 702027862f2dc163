//! quadglobe: quadtree level-of-detail core for planet-scale ellipsoidal
//! terrain.
//!
//! Per camera frame the core decides which tiles of a mercator-plus-polar
//! subdivision are visible at what resolution, splits or coarsens the
//! tree, masks in-flight terrain with ancestor data, and negotiates
//! crack-free seams between neighbors at different depths. The renderer
//! backend, imagery layers, terrain provider, and normal-map worker are
//! external collaborators behind the traits in [`render`] and [`terrain`].
//!
//! ```no_run
//! use quadglobe::{
//!     camera::{FrameCamera, Frustum},
//!     geo::LonLat,
//!     planet::{Planet, PlanetOptions},
//!     render::NullBackend,
//!     terrain::{ChannelTerrainSource, QueueNormalMapCreator},
//! };
//! use glam::DVec3;
//!
//! let (source, _requests, _completions) = ChannelTerrainSource::new();
//! let mut planet = Planet::new(
//!     PlanetOptions::default(),
//!     Box::new(NullBackend::new()),
//!     Box::new(source),
//!     Box::new(QueueNormalMapCreator::new()),
//! )?;
//!
//! let camera = FrameCamera::new(
//!     DVec3::new(0.0, 0.0, 15_000_000.0),
//!     LonLat::new(0.0, 90.0, 8_621_863.0),
//!     768.0,
//!     45f64.to_radians(),
//!     Frustum::infinite(),
//! );
//! planet.render_frame(&camera);
//! for key in planet.rendered_nodes() {
//!     let node = planet.node(*key);
//!     // hand node.segment buffers and side sizes to the renderer
//! }
//! # Ok::<(), quadglobe::GlobeError>(())
//! ```

pub mod camera;
pub mod error;
pub mod geo;
pub mod planet;
pub mod quadtree;
pub mod render;
pub mod segment;
pub mod terrain;

pub use camera::{FrameCamera, Frustum};
pub use error::{GlobeError, GlobeResult};
pub use geo::{BoundingSphere, Ellipsoid, Extent, LonLat, Projection};
pub use planet::{FrameState, Planet, PlanetOptions};
pub use quadtree::{Node, NodeKey, Quadrant, Side, TraversalState};
pub use segment::Segment;
pub use terrain::{TerrainSpec, TileIndex};
