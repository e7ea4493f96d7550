//! Style consumer boundary.
//!
//! Styles turn decoded [`TileData`] into per-tile mesh buffers. Vertex
//! construction is style-specific and lives outside the core; this module
//! only defines the interface the tile lifecycle manager drives, invoking
//! each registered style once per tile at load time and again when a
//! buffered tile is promoted into the visible set.

use crate::coord::MercatorProjection;
use crate::geometry::TileData;
use crate::tile::MapTile;

/// One style: a named consumer of decoded tile data.
pub trait Style: Send + Sync {
    /// The style's name, also the key of its mesh on each tile.
    fn name(&self) -> &str;

    /// Builds this style's mesh for one tile from its decoded data.
    ///
    /// Called on a worker job, once per tile, with the tile exclusively
    /// owned by the job; implementations attach their output via
    /// [`MapTile::insert_mesh`].
    fn add_data(&self, data: &TileData, tile: &mut MapTile, projection: &MercatorProjection);
}
