//! Runtime tile entity.
//!
//! A [`MapTile`] is one viewport-relevant tile: its [`TileID`], the
//! projection-derived scale factors, and — once its load job completes —
//! the decoded [`TileData`] plus the per-style mesh buffers built from it.

use std::collections::HashMap;
use std::sync::Arc;

use crate::coord::{MercatorProjection, TileID};
use crate::geometry::TileData;

/// Neutral GPU-ready mesh container produced by styles.
///
/// Vertices are interleaved `[x, y, z]` positions in tile-local space;
/// `indices` is a flat triangle (or line-segment) index list. What the
/// vertices mean beyond position is the producing style's business; the
/// core only stores and hands the buffers on for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshBuffer {
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of vertices.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Returns true if the buffer holds no geometry.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() && self.indices.is_empty()
    }
}

/// One tile in the working set.
///
/// Created empty when its [`TileID`] enters the visible set, populated by
/// an asynchronous load job, and dropped when evicted. A load job owns its
/// tile exclusively until completion, so none of the mutators here need
/// internal locking; sharing starts only after the manager wraps the
/// finished tile in an `Arc`.
#[derive(Debug, Clone)]
pub struct MapTile {
    id: TileID,
    projection: MercatorProjection,
    scale: f64,
    inverse_scale: f64,
    data: Option<Arc<TileData>>,
    meshes: HashMap<String, MeshBuffer>,
}

impl MapTile {
    /// Creates an empty tile for the given ID.
    ///
    /// The scale is the tile's half-extent in meters at its center
    /// latitude; its inverse converts encoded heights to tile units.
    pub fn new(id: TileID, projection: MercatorProjection) -> Self {
        let scale = projection.tile_scale(&id);
        Self {
            id,
            projection,
            scale,
            inverse_scale: 1.0 / scale,
            data: None,
            meshes: HashMap::new(),
        }
    }

    /// The tile's identifier.
    pub fn id(&self) -> &TileID {
        &self.id
    }

    /// The projection this tile was created against.
    pub fn projection(&self) -> &MercatorProjection {
        &self.projection
    }

    /// Meters covered by half of the tile's extent.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Inverse of [`scale`](MapTile::scale).
    pub fn inverse_scale(&self) -> f64 {
        self.inverse_scale
    }

    /// Attaches decoded tile data.
    pub fn set_data(&mut self, data: Arc<TileData>) {
        self.data = Some(data);
    }

    /// The decoded tile data, if the tile has finished loading.
    pub fn data(&self) -> Option<&Arc<TileData>> {
        self.data.as_ref()
    }

    /// True once tile data is attached.
    pub fn is_ready(&self) -> bool {
        self.data.is_some()
    }

    /// Stores a style's mesh output, replacing any previous buffer from
    /// the same style.
    pub fn insert_mesh(&mut self, style_name: impl Into<String>, mesh: MeshBuffer) {
        self.meshes.insert(style_name.into(), mesh);
    }

    /// The mesh built by the named style, if any.
    pub fn mesh(&self, style_name: &str) -> Option<&MeshBuffer> {
        self.meshes.get(style_name)
    }

    /// Number of style meshes attached.
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }
}
