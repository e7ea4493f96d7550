//! Vectile - vector-map tile engine core
//!
//! Vectile fetches encoded map tiles over HTTP, decodes the compact binary
//! VTM tile format into typed geometry and attribute records, and
//! maintains the working set of tiles matching a changing viewport.
//!
//! The two central subsystems are the [`decoder`], which walks a
//! length-prefixed, tag-delimited wire format into layered feature
//! collections, and the [`manager`], which diffs the viewport's
//! visible-tile set against its own, dispatches asynchronous
//! fetch+decode+style jobs, and promotes prefetched hierarchy tiles
//! without refetching. Rendering, gesture handling and platform
//! bootstrap are consumers of this crate, connected through the
//! [`style`] and [`view`] boundaries.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vectile::config::EngineConfig;
//! use vectile::manager::TileManager;
//! use vectile::source::ReqwestFetcher;
//!
//! # fn run(view: Arc<dyn vectile::view::View>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = EngineConfig::from_json(r#"{
//!     "sources": [{
//!         "name": "osm-vtm",
//!         "url_template": "http://tiles.example.com/vtm/[z]/[x]/[y].vtm"
//!     }]
//! }"#)?;
//!
//! let runtime = tokio::runtime::Runtime::new()?;
//! let fetcher = Arc::new(ReqwestFetcher::new()?);
//!
//! let mut manager = TileManager::new(view, config.manager.clone(), runtime.handle().clone());
//! for source in &config.sources {
//!     manager.add_data_source(source.build(fetcher.clone()));
//! }
//!
//! // Once per render tick:
//! let _changed = manager.update_tile_set();
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coord;
pub mod decoder;
pub mod geometry;
pub mod logging;
pub mod manager;
pub mod source;
pub mod style;
pub mod tile;
pub mod view;
pub mod wire;

pub use coord::{MercatorProjection, TileID};
pub use decoder::TileDecoder;
pub use geometry::{Feature, Geometry, Layer, Point, Properties, TileData};
pub use manager::{ManagerConfig, TileManager, TileState};
pub use source::{DataSource, SourceError};
pub use style::Style;
pub use tile::{MapTile, MeshBuffer};
pub use view::View;
