//! Tile data source abstraction.
//!
//! A [`DataSource`] is the fetch+cache boundary the tile lifecycle manager
//! works against: it retrieves raw tile payloads (HTTP), hands them to its
//! decoder, and keeps the decoded [`TileData`] in a per-source cache keyed
//! by [`TileID`]. Cache queries never trigger a fetch; loading is an
//! explicit async operation driven by the manager's load jobs.
//!
//! Concurrent loads for the same tile are not deduplicated here — a
//! duplicate in-flight fetch wastes work but cannot corrupt the cache,
//! which takes its own lock only for the final insert.

mod geojson;
mod http;
mod vtm;

pub use geojson::GeoJsonSource;
pub use http::{
    FetchError, HttpFetcher, ReqwestFetcher, CONNECT_TIMEOUT_SECS, FETCH_TIMEOUT_SECS,
};
pub use vtm::VtmSource;

#[cfg(test)]
pub use http::tests::MockFetcher;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::coord::TileID;
use crate::decoder::DecodeError;
use crate::geometry::TileData;
use crate::tile::MapTile;

/// Boxed future type for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Errors raised below the data source boundary.
///
/// These never cross the manager boundary as errors; the manager converts
/// them to log lines and the tile simply never becomes ready.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network retrieval failed.
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// The fetch succeeded but returned no bytes.
    #[error("tile payload was empty")]
    EmptyPayload,

    /// The payload could not be decoded at all.
    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    /// A GeoJSON payload was not valid JSON.
    #[error("invalid GeoJSON payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Abstract fetch+cache boundary used by the tile lifecycle manager.
///
/// Implementations are selected at configuration time and held as trait
/// objects; the manager iterates its registered sources in order for every
/// tile it loads.
pub trait DataSource: Send + Sync {
    /// Human-readable source name for logging.
    fn name(&self) -> &str;

    /// Lowest zoom level this source serves.
    fn min_zoom(&self) -> u8;

    /// Highest zoom level this source serves.
    fn max_zoom(&self) -> u8;

    /// Returns true if the source serves tiles at the given zoom.
    fn supports_zoom(&self, zoom: u8) -> bool {
        (self.min_zoom()..=self.max_zoom()).contains(&zoom)
    }

    /// Returns true if decoded data for the tile is already cached.
    fn has_tile_data(&self, id: &TileID) -> bool;

    /// Returns the cached data for the tile, never triggering a fetch.
    fn get_tile_data(&self, id: &TileID) -> Option<Arc<TileData>>;

    /// Fetches (unless cached), decodes and caches data for the tile.
    ///
    /// Loading outside the source's zoom range is a logged no-op.
    fn load_tile_data<'a>(&'a self, tile: &'a MapTile) -> BoxFuture<'a, Result<(), SourceError>>;

    /// Releases all cached tile data. Destructive and synchronous; used on
    /// reset or low-memory conditions.
    fn clear_data(&self);
}

/// Substitutes `[x]`, `[y]` and `[z]` placeholders in a URL template.
///
/// Each placeholder is replaced exactly once with the tile's decimal
/// component. A missing placeholder is logged, not rejected — the
/// best-effort URL is still attempted.
pub fn build_url(template: &str, id: &TileID) -> String {
    let mut url = template.to_string();

    for (placeholder, value) in [
        ("[x]", i64::from(id.x)),
        ("[y]", i64::from(id.y)),
        ("[z]", i64::from(id.z)),
    ] {
        match url.find(placeholder) {
            Some(pos) => url.replace_range(pos..pos + placeholder.len(), &value.to_string()),
            None => warn!(template, placeholder, "URL template missing placeholder"),
        }
    }
    url
}
