//! Engine configuration.
//!
//! Combines everything needed to assemble the tile engine — the list of
//! data sources and the manager settings — into one deserializable
//! surface, so an application can describe its tile stack in a JSON file
//! instead of wiring sources by hand.
//!
//! # Example
//!
//! ```
//! use vectile::config::EngineConfig;
//!
//! let config = EngineConfig::from_json(r#"{
//!     "sources": [{
//!         "name": "osm-vtm",
//!         "url_template": "http://tiles.example.com/vtm/[z]/[x]/[y].vtm",
//!         "max_zoom": 17
//!     }]
//! }"#).unwrap();
//! assert_eq!(config.sources.len(), 1);
//! ```

use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;

use crate::coord::{MAX_ZOOM, MIN_ZOOM};
use crate::manager::ManagerConfig;
use crate::source::{DataSource, GeoJsonSource, HttpFetcher, VtmSource};

/// Errors loading a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration was not valid JSON or did not match the schema.
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Which decoder a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Binary VTM vector tiles.
    #[default]
    Vtm,
    /// GeoJSON vector tiles.
    Geojson,
}

fn default_min_zoom() -> u8 {
    MIN_ZOOM
}

fn default_max_zoom() -> u8 {
    MAX_ZOOM
}

/// Configuration of one data source.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Source name, used in logs.
    pub name: String,

    /// URL template with `[x]`/`[y]`/`[z]` placeholders.
    pub url_template: String,

    /// Decoder selection.
    #[serde(default)]
    pub kind: SourceKind,

    /// Lowest zoom level the source serves.
    #[serde(default = "default_min_zoom")]
    pub min_zoom: u8,

    /// Highest zoom level the source serves.
    #[serde(default = "default_max_zoom")]
    pub max_zoom: u8,

    /// 3D-building-only decoding (VTM sources only).
    #[serde(default)]
    pub s3db: bool,
}

impl SourceConfig {
    /// Builds the configured data source around the given fetcher.
    pub fn build(&self, fetcher: Arc<dyn HttpFetcher>) -> Arc<dyn DataSource> {
        match self.kind {
            SourceKind::Vtm => {
                let mut source = VtmSource::new(&self.name, &self.url_template, fetcher)
                    .with_zoom_range(self.min_zoom, self.max_zoom);
                if self.s3db {
                    source = source.with_s3db();
                }
                Arc::new(source)
            }
            SourceKind::Geojson => Arc::new(
                GeoJsonSource::new(&self.name, &self.url_template, fetcher)
                    .with_zoom_range(self.min_zoom, self.max_zoom),
            ),
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineConfig {
    /// Data sources, consulted in order for every tile.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Tile lifecycle manager settings.
    #[serde(default)]
    pub manager: ManagerConfig,
}

impl EngineConfig {
    /// Parses a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MockFetcher;
    use bytes::Bytes;

    #[test]
    fn test_full_config_roundtrip() {
        let config = EngineConfig::from_json(
            r#"{
                "sources": [
                    {
                        "name": "osm-vtm",
                        "url_template": "http://t/vtm/[z]/[x]/[y].vtm",
                        "kind": "vtm",
                        "min_zoom": 2,
                        "max_zoom": 17,
                        "s3db": false
                    },
                    {
                        "name": "buildings-3d",
                        "url_template": "http://t/s3db/[z]/[x]/[y].vtm",
                        "s3db": true
                    },
                    {
                        "name": "overlay",
                        "url_template": "http://t/json/[z]/[x]/[y].json",
                        "kind": "geojson"
                    }
                ],
                "manager": {"max_workers": 4}
            }"#,
        )
        .unwrap();

        assert_eq!(config.sources.len(), 3);
        assert_eq!(config.sources[0].name, "osm-vtm");
        assert_eq!(config.sources[0].min_zoom, 2);
        assert_eq!(config.sources[0].max_zoom, 17);
        assert_eq!(config.sources[1].kind, SourceKind::Vtm, "Kind defaults to vtm");
        assert!(config.sources[1].s3db);
        assert_eq!(config.sources[2].kind, SourceKind::Geojson);
        assert_eq!(config.manager.max_workers, 4);
    }

    #[test]
    fn test_defaults_apply() {
        let config = EngineConfig::from_json("{}").unwrap();
        assert!(config.sources.is_empty());
        assert_eq!(config.manager.max_workers, 8);

        let source = EngineConfig::from_json(
            r#"{"sources": [{"name": "s", "url_template": "http://t/[z]/[x]/[y]"}]}"#,
        )
        .unwrap();
        assert_eq!(source.sources[0].min_zoom, MIN_ZOOM);
        assert_eq!(source.sources[0].max_zoom, MAX_ZOOM);
        assert!(!source.sources[0].s3db);
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let result = EngineConfig::from_json("{sources: nope");
        assert!(matches!(result, Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_build_constructs_configured_sources() {
        let config = EngineConfig::from_json(
            r#"{
                "sources": [
                    {"name": "vtm", "url_template": "http://t/[z]/[x]/[y].vtm", "min_zoom": 3, "max_zoom": 12},
                    {"name": "json", "url_template": "http://t/[z]/[x]/[y].json", "kind": "geojson"}
                ]
            }"#,
        )
        .unwrap();

        let fetcher = Arc::new(MockFetcher::new(Ok(Bytes::new())));
        let sources: Vec<_> = config
            .sources
            .iter()
            .map(|s| s.build(fetcher.clone()))
            .collect();

        assert_eq!(sources[0].name(), "vtm");
        assert_eq!(sources[0].min_zoom(), 3);
        assert_eq!(sources[0].max_zoom(), 12);
        assert!(!sources[0].supports_zoom(2));
        assert_eq!(sources[1].name(), "json");
    }
}
