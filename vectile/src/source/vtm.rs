//! Network-backed source for the binary VTM tile format.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{build_url, BoxFuture, DataSource, SourceError};
use crate::coord::{TileID, MAX_ZOOM, MIN_ZOOM};
use crate::decoder::TileDecoder;
use crate::geometry::TileData;
use crate::source::HttpFetcher;
use crate::tile::MapTile;

/// Data source serving VTM-encoded vector tiles over HTTP.
///
/// Fetches payloads through an [`HttpFetcher`], decodes them with a
/// [`TileDecoder`], and keeps the results in a per-source cache guarded by
/// its own lock, independent of the manager's tile-set lock.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use vectile::source::{ReqwestFetcher, VtmSource};
///
/// let fetcher = Arc::new(ReqwestFetcher::new().unwrap());
/// let source = VtmSource::new(
///     "osm-vtm",
///     "http://tiles.example.com/vtm/[z]/[x]/[y].vtm",
///     fetcher,
/// );
/// ```
pub struct VtmSource {
    name: String,
    url_template: String,
    fetcher: Arc<dyn HttpFetcher>,
    decoder: TileDecoder,
    min_zoom: u8,
    max_zoom: u8,
    store: Mutex<HashMap<TileID, Arc<TileData>>>,
}

impl VtmSource {
    /// Creates a source serving the full zoom range in regular mode.
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        fetcher: Arc<dyn HttpFetcher>,
    ) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            fetcher,
            decoder: TileDecoder::new(),
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            store: Mutex::new(HashMap::new()),
        }
    }

    /// Restricts the source to a zoom range.
    pub fn with_zoom_range(mut self, min_zoom: u8, max_zoom: u8) -> Self {
        self.min_zoom = min_zoom;
        self.max_zoom = max_zoom;
        self
    }

    /// Switches the source to 3D-building-only decoding.
    pub fn with_s3db(mut self) -> Self {
        self.decoder = TileDecoder::with_s3db();
        self
    }

    /// The URL template this source fetches from.
    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    /// Number of tiles currently cached.
    pub fn cached_tile_count(&self) -> usize {
        self.store.lock().len()
    }
}

impl DataSource for VtmSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn min_zoom(&self) -> u8 {
        self.min_zoom
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }

    fn has_tile_data(&self, id: &TileID) -> bool {
        self.store.lock().contains_key(id)
    }

    fn get_tile_data(&self, id: &TileID) -> Option<Arc<TileData>> {
        self.store.lock().get(id).cloned()
    }

    fn load_tile_data<'a>(&'a self, tile: &'a MapTile) -> BoxFuture<'a, Result<(), SourceError>> {
        Box::pin(async move {
            let id = *tile.id();

            if !self.supports_zoom(id.z) {
                debug!(source = self.name, tile = %id, "tile outside source zoom range");
                return Ok(());
            }

            if self.has_tile_data(&id) {
                // Tile has been fetched already
                debug!(source = self.name, tile = %id, "tile already cached");
                return Ok(());
            }

            let url = build_url(&self.url_template, &id);
            info!(source = self.name, tile = %id, url, "fetching tile");

            let payload = self.fetcher.fetch(&url).await?;
            if payload.is_empty() {
                return Err(SourceError::EmptyPayload);
            }

            let data = self.decoder.decode(tile, &payload)?;

            let mut store = self.store.lock();
            store.insert(id, Arc::new(data));
            Ok(())
        })
    }

    fn clear_data(&self) {
        self.store.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::MercatorProjection;
    use crate::source::{FetchError, MockFetcher};
    use crate::wire::testenc as enc;
    use bytes::Bytes;

    /// Minimal valid tile: header plus one water point feature.
    fn water_tile_payload() -> Bytes {
        let mut tags_body = Vec::new();
        enc::varint(&mut tags_body, 40); // key "natural"
        enc::varint(&mut tags_body, 7); // value "water"

        let mut feature = Vec::new();
        let mut tag_ids = Vec::new();
        enc::varint(&mut tag_ids, 0);
        enc::bytes_field(&mut feature, 11, &tag_ids);
        let mut coords = Vec::new();
        enc::svarint(&mut coords, 2048);
        enc::svarint(&mut coords, 2048);
        enc::bytes_field(&mut feature, 13, &coords);

        let mut out = vec![0u8; 4];
        enc::bytes_field(&mut out, 16, &tags_body);
        enc::bytes_field(&mut out, 23, &feature);
        Bytes::from(out)
    }

    fn tile(z: u8) -> MapTile {
        MapTile::new(TileID::new(1, 2, z), MercatorProjection::new())
    }

    #[tokio::test]
    async fn test_load_fetches_decodes_and_caches() {
        let fetcher = Arc::new(MockFetcher::new(Ok(water_tile_payload())));
        let source = VtmSource::new("test", "http://t/[z]/[x]/[y].vtm", fetcher.clone());

        let tile = tile(5);
        source.load_tile_data(&tile).await.unwrap();

        assert!(source.has_tile_data(tile.id()));
        let data = source.get_tile_data(tile.id()).expect("data cached");
        assert!(data.layer("water").is_some());
        assert_eq!(fetcher.fetch_count(), 1);
        assert_eq!(fetcher.requested_urls(), vec!["http://t/5/1/2.vtm"]);
    }

    #[tokio::test]
    async fn test_cached_tile_short_circuits_fetch() {
        let fetcher = Arc::new(MockFetcher::new(Ok(water_tile_payload())));
        let source = VtmSource::new("test", "http://t/[z]/[x]/[y].vtm", fetcher.clone());

        let tile = tile(5);
        source.load_tile_data(&tile).await.unwrap();
        source.load_tile_data(&tile).await.unwrap();

        assert_eq!(fetcher.fetch_count(), 1, "Second load must not refetch");
    }

    #[tokio::test]
    async fn test_get_tile_data_never_fetches() {
        let fetcher = Arc::new(MockFetcher::new(Ok(water_tile_payload())));
        let source = VtmSource::new("test", "http://t/[z]/[x]/[y].vtm", fetcher.clone());

        assert!(source.get_tile_data(&TileID::new(1, 2, 5)).is_none());
        assert!(!source.has_tile_data(&TileID::new(1, 2, 5)));
        assert_eq!(fetcher.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_propagates_and_caches_nothing() {
        let fetcher = Arc::new(MockFetcher::new(Err(FetchError::Request(
            "connection refused".to_string(),
        ))));
        let source = VtmSource::new("test", "http://t/[z]/[x]/[y].vtm", fetcher);

        let tile = tile(5);
        let result = source.load_tile_data(&tile).await;
        assert!(matches!(result, Err(SourceError::Fetch(_))));
        assert!(!source.has_tile_data(tile.id()));
    }

    #[tokio::test]
    async fn test_empty_payload_is_an_error() {
        let fetcher = Arc::new(MockFetcher::new(Ok(Bytes::new())));
        let source = VtmSource::new("test", "http://t/[z]/[x]/[y].vtm", fetcher);

        let result = source.load_tile_data(&tile(5)).await;
        assert!(matches!(result, Err(SourceError::EmptyPayload)));
    }

    #[tokio::test]
    async fn test_out_of_range_zoom_is_a_no_op() {
        let fetcher = Arc::new(MockFetcher::new(Ok(water_tile_payload())));
        let source =
            VtmSource::new("test", "http://t/[z]/[x]/[y].vtm", fetcher.clone()).with_zoom_range(4, 10);

        let tile = tile(2);
        source.load_tile_data(&tile).await.unwrap();
        assert_eq!(fetcher.fetch_count(), 0, "No fetch outside the zoom range");
        assert!(!source.has_tile_data(tile.id()));
    }

    #[tokio::test]
    async fn test_clear_data_releases_cache() {
        let fetcher = Arc::new(MockFetcher::new(Ok(water_tile_payload())));
        let source = VtmSource::new("test", "http://t/[z]/[x]/[y].vtm", fetcher);

        let tile = tile(5);
        source.load_tile_data(&tile).await.unwrap();
        assert_eq!(source.cached_tile_count(), 1);

        source.clear_data();
        assert_eq!(source.cached_tile_count(), 0);
        assert!(!source.has_tile_data(tile.id()));
    }
}
