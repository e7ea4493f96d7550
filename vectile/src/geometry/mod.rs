//! Typed geometry and attribute model for decoded tiles.
//!
//! The decoder produces one [`TileData`] per tile: an ordered list of named
//! [`Layer`]s, each holding [`Feature`]s that pair a geometry with its
//! resolved attributes. `TileData` is immutable once parsed and shared
//! read-only by every style that consumes it.

use std::collections::HashMap;

/// One 3D coordinate in tile-local normalized space.
///
/// `x` and `y` lie in `[-1, 1]` over the tile's extent; `z` is an
/// elevation/height in world units, zero for flat geometry.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Point {
    /// Creates a point.
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// An ordered sequence of points forming an open polyline.
pub type Line = Vec<Point>;

/// Closed rings; the first ring is the outer boundary, subsequent rings
/// are holes, following the standard ring-winding convention.
pub type Polygon = Vec<Line>;

/// Geometry of one feature, tagged by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    /// Standalone points.
    Points(Vec<Point>),
    /// Open polylines.
    Lines(Vec<Line>),
    /// Polygons with outer ring and holes.
    Polygons(Vec<Polygon>),
    /// Triangle-list mesh with raw 3D vertices and a flat index buffer.
    Mesh {
        vertices: Vec<Point>,
        indices: Vec<u32>,
    },
}

impl Geometry {
    /// Returns a short name for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Points(_) => "points",
            Geometry::Lines(_) => "lines",
            Geometry::Polygons(_) => "polygons",
            Geometry::Mesh { .. } => "mesh",
        }
    }

    /// Returns true if the geometry holds no coordinates at all.
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Points(points) => points.is_empty(),
            Geometry::Lines(lines) => lines.is_empty(),
            Geometry::Polygons(polygons) => polygons.is_empty(),
            Geometry::Mesh { vertices, .. } => vertices.is_empty(),
        }
    }
}

/// Resolved attributes of one feature.
///
/// Keys are unique per feature. Lookups are default-valued: a key absent
/// from the wire data reads as the empty string or zero, never as a missing
/// entry, so style rules can probe attributes unconditionally.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    string_props: HashMap<String, String>,
    numeric_props: HashMap<String, f64>,
}

impl Properties {
    /// Creates an empty property set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a string attribute, keeping the first value on duplicates.
    pub fn insert_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.string_props.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Inserts a numeric attribute, keeping the first value on duplicates.
    pub fn insert_number(&mut self, key: impl Into<String>, value: f64) {
        self.numeric_props.entry(key.into()).or_insert(value);
    }

    /// Returns the string value for `key`, or `""` if absent.
    pub fn get_string(&self, key: &str) -> &str {
        self.string_props.get(key).map(String::as_str).unwrap_or("")
    }

    /// Returns the numeric value for `key`, or `0.0` if absent.
    pub fn get_number(&self, key: &str) -> f64 {
        self.numeric_props.get(key).copied().unwrap_or(0.0)
    }

    /// Returns true if the key is present as a string attribute.
    pub fn contains_string(&self, key: &str) -> bool {
        self.string_props.contains_key(key)
    }

    /// Returns true if the key is present as a numeric attribute.
    pub fn contains_number(&self, key: &str) -> bool {
        self.numeric_props.contains_key(key)
    }

    /// Number of attributes of either kind.
    pub fn len(&self) -> usize {
        self.string_props.len() + self.numeric_props.len()
    }

    /// Returns true if no attributes are present.
    pub fn is_empty(&self) -> bool {
        self.string_props.is_empty() && self.numeric_props.is_empty()
    }
}

/// One geometry object plus its attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub geometry: Geometry,
    pub props: Properties,
}

impl Feature {
    /// Creates a feature with empty properties.
    pub fn new(geometry: Geometry) -> Self {
        Self {
            geometry,
            props: Properties::new(),
        }
    }
}

/// Named group of features sharing a thematic classification.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Layer {
    pub name: String,
    pub features: Vec<Feature>,
}

impl Layer {
    /// Creates an empty layer with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            features: Vec::new(),
        }
    }
}

/// Complete decoder output for one tile: an ordered sequence of layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileData {
    pub layers: Vec<Layer>,
}

impl TileData {
    /// Creates an empty tile data container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the layer with the given name, creating it at the end of
    /// the layer list if absent. Name uniqueness is enforced by this
    /// linear lookup-or-create.
    pub fn layer_mut(&mut self, name: &str) -> &mut Layer {
        if let Some(idx) = self.layers.iter().position(|l| l.name == name) {
            return &mut self.layers[idx];
        }
        self.layers.push(Layer::new(name));
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    /// Returns the layer with the given name, if present.
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    /// Appends an empty feature to the named layer and returns it.
    pub fn add_feature(&mut self, layer_name: &str, geometry: Geometry) -> &mut Feature {
        let layer = self.layer_mut(layer_name);
        layer.features.push(Feature::new(geometry));
        let last = layer.features.len() - 1;
        &mut layer.features[last]
    }

    /// Total number of features across all layers.
    pub fn feature_count(&self) -> usize {
        self.layers.iter().map(|l| l.features.len()).sum()
    }
}
