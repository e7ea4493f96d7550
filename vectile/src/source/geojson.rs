//! Network-backed source for GeoJSON vector tiles.
//!
//! Some tile servers deliver the same layered content as the binary format
//! but as GeoJSON: either a single FeatureCollection, or an object mapping
//! layer names to FeatureCollections. Features arrive pre-classified into
//! layers, so no tag classification runs here; geographic positions are
//! projected into the same tile-local normalized space the binary decoder
//! produces.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{build_url, BoxFuture, DataSource, SourceError};
use crate::coord::{to_fractional_tile, TileID, MAX_ZOOM, MIN_ZOOM};
use crate::geometry::{Geometry, Line, Point, Polygon, TileData};
use crate::source::HttpFetcher;
use crate::tile::MapTile;

/// Data source serving GeoJSON vector tiles over HTTP.
pub struct GeoJsonSource {
    name: String,
    url_template: String,
    fetcher: Arc<dyn HttpFetcher>,
    min_zoom: u8,
    max_zoom: u8,
    store: Mutex<HashMap<TileID, Arc<TileData>>>,
}

impl GeoJsonSource {
    /// Creates a source serving the full zoom range.
    pub fn new(
        name: impl Into<String>,
        url_template: impl Into<String>,
        fetcher: Arc<dyn HttpFetcher>,
    ) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
            fetcher,
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

    fn parse(&self, tile: &MapTile, payload: &[u8]) -> Result<TileData, SourceError> {
        let root: Value = serde_json::from_slice(payload)?;
        let mut data = TileData::new();

        match &root {
            Value::Object(map) if map.get("type").and_then(Value::as_str) == Some("FeatureCollection") => {
                self.parse_collection(&self.name, &root, tile, &mut data);
            }
            Value::Object(map) => {
                for (layer_name, collection) in map {
                    self.parse_collection(layer_name, collection, tile, &mut data);
                }
            }
            _ => warn!(source = self.name, "GeoJSON root is neither object nor collection"),
        }

        Ok(data)
    }

    fn parse_collection(&self, layer_name: &str, collection: &Value, tile: &MapTile, data: &mut TileData) {
        let Some(features) = collection.get("features").and_then(Value::as_array) else {
            warn!(
                source = self.name,
                layer = layer_name,
                "layer carries no feature array"
            );
            return;
        };

        for feature in features {
            let Some(geometry) = feature.get("geometry") else {
                continue;
            };
            let Some(geometry) = self.parse_geometry(geometry, tile.id()) else {
                continue;
            };

            let entry = data.add_feature(layer_name, geometry);
            if let Some(props) = feature.get("properties").and_then(Value::as_object) {
                for (key, value) in props {
                    match value {
                        Value::String(s) => entry.props.insert_string(key, s.as_str()),
                        Value::Number(n) => {
                            entry.props.insert_number(key, n.as_f64().unwrap_or(0.0))
                        }
                        Value::Bool(b) => {
                            entry.props.insert_string(key, if *b { "yes" } else { "no" })
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    fn parse_geometry(&self, geometry: &Value, id: &TileID) -> Option<Geometry> {
        let kind = geometry.get("type").and_then(Value::as_str)?;
        let coordinates = geometry.get("coordinates")?;

        match kind {
            "Point" => Some(Geometry::Points(
                self.project_position(coordinates, id).into_iter().collect(),
            )),
            "MultiPoint" => Some(Geometry::Points(self.project_line(coordinates, id))),
            "LineString" => Some(Geometry::Lines(vec![self.project_line(coordinates, id)])),
            "MultiLineString" => Some(Geometry::Lines(self.project_lines(coordinates, id))),
            "Polygon" => Some(Geometry::Polygons(vec![self.project_lines(coordinates, id)])),
            "MultiPolygon" => {
                let polygons: Vec<Polygon> = coordinates
                    .as_array()
                    .map(|polys| polys.iter().map(|p| self.project_lines(p, id)).collect())
                    .unwrap_or_default();
                Some(Geometry::Polygons(polygons))
            }
            other => {
                debug!(source = self.name, kind = other, "unsupported GeoJSON geometry");
                None
            }
        }
    }

    fn project_lines(&self, value: &Value, id: &TileID) -> Vec<Line> {
        value
            .as_array()
            .map(|lines| lines.iter().map(|l| self.project_line(l, id)).collect())
            .unwrap_or_default()
    }

    fn project_line(&self, value: &Value, id: &TileID) -> Vec<Point> {
        value
            .as_array()
            .map(|positions| {
                positions
                    .iter()
                    .filter_map(|p| self.project_position(p, id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Projects one `[lon, lat]` position into tile-local normalized space.
    fn project_position(&self, value: &Value, id: &TileID) -> Option<Point> {
        let position = value.as_array()?;
        let lon = position.first()?.as_f64()?;
        let lat = position.get(1)?.as_f64()?;

        let (fx, fy) = match to_fractional_tile(lat, lon, id.z) {
            Ok(frac) => frac,
            Err(err) => {
                warn!(source = self.name, error = %err, "position outside projection bounds");
                return None;
            }
        };

        let u = fx - f64::from(id.x);
        let v = fy - f64::from(id.y);
        Some(Point::new(
            (2.0 * u - 1.0) as f32,
            (1.0 - 2.0 * v) as f32,
            0.0,
        ))
    }

    /// Number of tiles currently cached.
    pub fn cached_tile_count(&self) -> usize {
        self.store.lock().len()
    }
}

impl DataSource for GeoJsonSource {
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
                debug!(source = self.name, tile = %id, "tile already cached");
                return Ok(());
            }

            let url = build_url(&self.url_template, &id);
            info!(source = self.name, tile = %id, url, "fetching tile");

            let payload = self.fetcher.fetch(&url).await?;
            if payload.is_empty() {
                return Err(SourceError::EmptyPayload);
            }

            let data = self.parse(tile, &payload)?;

            let mut store = self.store.lock();
            store.insert(id, Arc::new(data));
            Ok(())
        })
    }

    fn clear_data(&self) {
        self.store.lock().clear();
    }
}
