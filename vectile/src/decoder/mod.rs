//! Binary vector tile decoder.
//!
//! Transforms one tile's raw byte payload into a [`TileData`]: a fixed
//! 4-byte framing header, then a tag-delimited stream carrying the tile's
//! interned key/value string tables, a tag table of `(key, value)` index
//! pairs, and geometry groups (lines, polygons, points, meshes) whose
//! features reference tags by table index and encode coordinates as
//! zig-zag varint deltas in a 4096-unit tile-local extent.
//!
//! Damage tolerance: a truncated buffer or a ring with fewer decodable
//! points than declared is logged and decoding keeps whatever was
//! recovered. Only a payload too short to contain the framing header fails
//! the tile outright. Unknown fields are skipped by wire type, preserving
//! forward compatibility.

mod tags;

pub use tags::{resolve_key, resolve_value, ATTRIB_OFFSET, INVALID, MAX_KEY, MAX_VAL};

use std::time::Instant;

use thiserror::Error;
use tracing::{debug, warn};

use crate::geometry::{Geometry, Line, Point, Polygon, Properties, TileData};
use crate::tile::MapTile;
use crate::wire::{Cursor, WireError};

/// Integer coordinate extent of one tile on the wire.
pub const TILE_EXTENT: i32 = 4096;

const INV_TILE_EXTENT: f32 = 1.0 / TILE_EXTENT as f32;

/// Bytes of framing header preceding the tagged stream.
pub const HEADER_LEN: usize = 4;

// Top-level field tags.
const TAG_VERSION: u32 = 1;
const TAG_TIMESTAMP: u32 = 2;
const TAG_WATER_TILE: u32 = 3;
const TAG_NUM_TAGS: u32 = 11;
const TAG_NUM_KEYS: u32 = 12;
const TAG_NUM_VALS: u32 = 13;
const TAG_KEYS: u32 = 14;
const TAG_VALS: u32 = 15;
const TAG_TAGS: u32 = 16;
const TAG_ELEM_LINES: u32 = 21;
const TAG_ELEM_POLY: u32 = 22;
const TAG_ELEM_POINT: u32 = 23;
const TAG_ELEM_MESH: u32 = 24;

// Per-feature field tags.
const ELEM_NUM_INDICES: u32 = 1;
const ELEM_NUM_TAGS: u32 = 2;
const ELEM_TAGS: u32 = 11;
const ELEM_INDICES: u32 = 12;
const ELEM_COORDINATES: u32 = 13;
const ELEM_OSM_LAYER: u32 = 21;

// Target layer names assigned by classification.
const LAYER_WATER: &str = "water";
const LAYER_ROADS: &str = "roads";
const LAYER_BUILDINGS: &str = "buildings";
const LAYER_S3DB: &str = "s3db";
const LAYER_LANDUSE: &str = "landuse";
const LAYER_EARTH: &str = "earth";

/// Hard decode failures.
///
/// Everything past the framing header is decoded tolerantly; this error
/// only fires when the payload cannot even be framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is shorter than the fixed framing header.
    #[error("payload of {0} bytes is shorter than the framing header")]
    MissingHeader(usize),
}

/// One `(key, value)` index pair from the tile's tag table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TagId {
    key: u32,
    val: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GeomKind {
    Lines,
    Polygons,
    Points,
    Mesh,
}

/// Accumulated per-feature decode state.
#[derive(Default)]
struct FeatureState {
    indices: Vec<u32>,
    tag_ids: Vec<u32>,
    target: Option<&'static str>,
    props: Properties,
    geometry: Option<Geometry>,
    tags_seen: bool,
}

/// Decoder for the binary vector tile format.
///
/// Carries the per-source decode mode; one decoder serves any number of
/// tiles. With `s3db` enabled the tile is treated as 3D-building-only:
/// building features land in the `"s3db"` layer and no fallback earth
/// geometry is synthesized for unclassified features.
#[derive(Debug, Clone, Copy, Default)]
pub struct TileDecoder {
    s3db: bool,
}

impl TileDecoder {
    /// Creates a decoder for regular tiles.
    pub fn new() -> Self {
        Self { s3db: false }
    }

    /// Creates a decoder in 3D-building-only mode.
    pub fn with_s3db() -> Self {
        Self { s3db: true }
    }

    /// Returns true if 3D-building-only mode is active.
    pub fn is_s3db(&self) -> bool {
        self.s3db
    }

    /// Decodes one tile payload.
    ///
    /// `tile` supplies the projection-derived scale used to convert
    /// encoded heights into world units.
    ///
    /// # Errors
    ///
    /// Only a payload shorter than the framing header fails; all other
    /// damage is tolerated with warnings and partial output.
    pub fn decode(&self, tile: &MapTile, payload: &[u8]) -> Result<TileData, DecodeError> {
        if payload.len() < HEADER_LEN {
            return Err(DecodeError::MissingHeader(payload.len()));
        }

        let started = Instant::now();
        let mut data = TileData::new();

        // The framing header carries the payload length, already known here.
        let mut cursor = Cursor::new(&payload[HEADER_LEN..]);

        if let Err(err) = self.walk_top_level(&mut cursor, tile, &mut data) {
            warn!(
                tile = %tile.id(),
                error = %err,
                "tile stream damaged, keeping partially decoded data"
            );
        }

        debug!(
            tile = %tile.id(),
            layers = data.layers.len(),
            features = data.feature_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "tile decoded"
        );

        Ok(data)
    }

    fn walk_top_level(
        &self,
        cursor: &mut Cursor<'_>,
        tile: &MapTile,
        data: &mut TileData,
    ) -> Result<(), WireError> {
        let mut keys: Vec<String> = Vec::new();
        let mut vals: Vec<String> = Vec::new();
        let mut tags: Vec<TagId> = Vec::new();

        while cursor.next()? {
            match cursor.tag() {
                TAG_VERSION | TAG_TIMESTAMP | TAG_WATER_TILE => cursor.skip()?,

                TAG_NUM_TAGS => {
                    let num = cursor.int64()?;
                    tags.reserve(num.min(100) as usize);
                }
                TAG_NUM_KEYS => {
                    let num = cursor.int64()?;
                    keys.reserve(num.min(100) as usize);
                }
                TAG_NUM_VALS => {
                    let num = cursor.int64()?;
                    vals.reserve(num.min(100) as usize);
                }

                TAG_KEYS => keys.push(cursor.string()?),
                TAG_VALS => vals.push(cursor.string()?),
                TAG_TAGS => read_tag_pairs(cursor.message()?, &mut tags),

                TAG_ELEM_LINES => {
                    self.extract_feature(cursor.message()?, GeomKind::Lines, &tags, &keys, &vals, tile, data)
                }
                TAG_ELEM_POLY => {
                    self.extract_feature(cursor.message()?, GeomKind::Polygons, &tags, &keys, &vals, tile, data)
                }
                TAG_ELEM_POINT => {
                    self.extract_feature(cursor.message()?, GeomKind::Points, &tags, &keys, &vals, tile, data)
                }
                TAG_ELEM_MESH => {
                    self.extract_feature(cursor.message()?, GeomKind::Mesh, &tags, &keys, &vals, tile, data)
                }

                _ => cursor.skip()?,
            }
        }
        Ok(())
    }

    /// Extracts one feature from its sub-message.
    ///
    /// Classification is first-match-wins over the feature's tags; an
    /// unclassified feature copies no attributes and has its geometry
    /// skipped, yielding the fallback earth quad instead (unless in
    /// 3D-building-only mode).
    #[allow(clippy::too_many_arguments)]
    fn extract_feature(
        &self,
        mut it: Cursor<'_>,
        kind: GeomKind,
        tags: &[TagId],
        keys: &[String],
        vals: &[String],
        tile: &MapTile,
        data: &mut TileData,
    ) {
        let mut state = FeatureState::default();

        // Tolerate mid-feature damage; keep what was recovered so far.
        if let Err(err) = self.walk_feature(&mut it, kind, tags, keys, vals, tile, &mut state) {
            warn!(
                tile = %tile.id(),
                error = %err,
                "feature stream damaged"
            );
        }

        match state.target {
            Some(layer) => {
                let geometry = state.geometry.unwrap_or_else(|| empty_geometry(kind));
                let feature = data.add_feature(layer, geometry);
                feature.props = state.props;
            }
            None if !self.s3db => {
                // Deliberate background fallback: an unclassified feature
                // contributes a full-tile earth quad, not its own geometry.
                data.add_feature(LAYER_EARTH, earth_quad());
            }
            None => {}
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_feature(
        &self,
        it: &mut Cursor<'_>,
        kind: GeomKind,
        tags: &[TagId],
        keys: &[String],
        vals: &[String],
        tile: &MapTile,
        state: &mut FeatureState,
    ) -> Result<(), WireError> {
        while it.next()? {
            // Once classification failed there is nothing left to collect
            // for this feature.
            if state.tags_seen && state.target.is_none() {
                it.skip()?;
                continue;
            }

            match it.tag() {
                ELEM_NUM_INDICES => {
                    let num = it.int64()?;
                    state.indices.reserve(num.min(100) as usize);
                }
                ELEM_NUM_TAGS => {
                    let num = it.int64()?;
                    state.tag_ids.reserve(num.saturating_mul(2).min(100) as usize);
                }

                ELEM_TAGS => {
                    read_uint_array(it.message()?, &mut state.tag_ids);
                    state.tags_seen = true;
                    state.target = self.classify(&state.tag_ids, tags, keys, vals, &mut state.props);

                    if state.target.is_some() {
                        self.copy_attributes(
                            &state.tag_ids,
                            tags,
                            keys,
                            vals,
                            tile.inverse_scale(),
                            &mut state.props,
                        );
                    }
                }

                ELEM_INDICES => read_uint_array(it.message()?, &mut state.indices),

                ELEM_COORDINATES => {
                    if state.target.is_none() {
                        it.skip()?;
                        continue;
                    }
                    let mut geom = it.message()?;
                    state.geometry = Some(parse_geometry(&mut geom, kind, &state.indices, tile));
                }

                ELEM_OSM_LAYER => it.skip()?,

                _ => it.skip()?,
            }
        }
        Ok(())
    }

    /// First-match-wins classification of a feature's resolved tags.
    fn classify(
        &self,
        tag_ids: &[u32],
        tags: &[TagId],
        keys: &[String],
        vals: &[String],
        props: &mut Properties,
    ) -> Option<&'static str> {
        for &tag_index in tag_ids {
            let Some(tag) = tags.get(tag_index as usize) else {
                warn!(tag_index, table_len = tags.len(), "tag index outside tag table");
                continue;
            };
            let key = resolve_key(tag.key, keys);
            let value = resolve_value(tag.val, vals);

            if key == "natural" && value == "water" {
                return Some(LAYER_WATER);
            }
            if key == "highway" {
                let kind = match value {
                    "motorway" | "motorway_link" | "trunk" | "trunk_link" | "primary"
                    | "primary_link" => "highway",
                    _ => "minor_road",
                };
                props.insert_string("kind", kind);
                return Some(LAYER_ROADS);
            }
            if key == "building" || key == "roof" {
                props.insert_string("kind", value);
                return Some(if self.s3db { LAYER_S3DB } else { LAYER_BUILDINGS });
            }
            if key == "landuse" || key == "natural" {
                props.insert_string("kind", value);
                return Some(LAYER_LANDUSE);
            }
        }
        None
    }

    /// Copies every resolved tag into the feature's properties.
    ///
    /// Height-like keys carry centimeter-ish encoded values; they become
    /// numeric world units via the tile's inverse scale.
    fn copy_attributes(
        &self,
        tag_ids: &[u32],
        tags: &[TagId],
        keys: &[String],
        vals: &[String],
        inverse_scale: f64,
        props: &mut Properties,
    ) {
        for &tag_index in tag_ids {
            let Some(tag) = tags.get(tag_index as usize) else {
                continue;
            };
            let key = resolve_key(tag.key, keys);
            let value = resolve_value(tag.val, vals);

            if key == "height" || key == "min_height" {
                let number = parse_leading_int(value) as f64 * inverse_scale / 100.0;
                props.insert_number(key, number);
            } else {
                props.insert_string(key, value);
            }
        }
    }
}

fn empty_geometry(kind: GeomKind) -> Geometry {
    match kind {
        GeomKind::Points => Geometry::Points(Vec::new()),
        GeomKind::Lines => Geometry::Lines(Vec::new()),
        GeomKind::Polygons => Geometry::Polygons(Vec::new()),
        GeomKind::Mesh => Geometry::Mesh {
            vertices: Vec::new(),
            indices: Vec::new(),
        },
    }
}

fn earth_quad() -> Geometry {
    Geometry::Polygons(vec![vec![vec![
        Point::new(-1.0, -1.0, 0.0),
        Point::new(1.0, -1.0, 0.0),
        Point::new(1.0, 1.0, 0.0),
        Point::new(-1.0, 1.0, 0.0),
    ]]])
}

fn parse_geometry(
    geom: &mut Cursor<'_>,
    kind: GeomKind,
    indices: &[u32],
    tile: &MapTile,
) -> Geometry {
    match kind {
        GeomKind::Lines => {
            let mut idx = 0;
            let (mut last_x, mut last_y) = (0, 0);
            Geometry::Lines(parse_lines(geom, indices, &mut idx, &mut last_x, &mut last_y))
        }
        GeomKind::Polygons => {
            let mut idx = 0;
            Geometry::Polygons(parse_polys(geom, indices, &mut idx))
        }
        GeomKind::Points => {
            let num_pts = indices.first().copied().unwrap_or(1);
            let (mut last_x, mut last_y) = (0, 0);
            Geometry::Points(parse_points(geom, num_pts, &mut last_x, &mut last_y))
        }
        GeomKind::Mesh => Geometry::Mesh {
            vertices: parse_points_3d(geom, tile.inverse_scale()),
            indices: indices.to_vec(),
        },
    }
}

/// Decodes up to `len` delta-coded 2D points, continuing the caller's
/// coordinate accumulator.
fn parse_points(it: &mut Cursor<'_>, len: u32, last_x: &mut i32, last_y: &mut i32) -> Vec<Point> {
    let mut points = Vec::with_capacity(len.min(4096) as usize);
    let mut cnt: u64 = 0;
    let mut x = *last_x;
    let mut y = *last_y;

    while it.has_more() && cnt < u64::from(len) * 2 {
        let delta = match it.svarint() {
            Ok(delta) => delta as i32,
            Err(err) => {
                warn!(error = %err, "coordinate stream truncated");
                break;
            }
        };
        if cnt % 2 == 0 {
            x += delta;
        } else {
            y += delta;
            points.push(Point::new(
                (2 * x - TILE_EXTENT) as f32 * INV_TILE_EXTENT,
                (TILE_EXTENT - 2 * y) as f32 * INV_TILE_EXTENT,
                0.0,
            ));
        }
        cnt += 1;
    }

    *last_x = x;
    *last_y = y;
    points
}

/// Decodes delta-coded 3D points until the block ends. The z component is
/// tenths of a unit, scaled to world units by the tile's inverse scale.
fn parse_points_3d(it: &mut Cursor<'_>, inverse_scale: f64) -> Vec<Point> {
    let mut points = Vec::new();
    let mut cnt: u64 = 0;
    let (mut x, mut y, mut z) = (0i32, 0i32, 0i32);

    while it.has_more() {
        let delta = match it.svarint() {
            Ok(delta) => delta as i32,
            Err(err) => {
                warn!(error = %err, "mesh coordinate stream truncated");
                break;
            }
        };
        match cnt % 3 {
            0 => x += delta,
            1 => y += delta,
            _ => {
                z += delta;
                points.push(Point::new(
                    (2 * x - TILE_EXTENT) as f32 * INV_TILE_EXTENT,
                    (TILE_EXTENT - 2 * y) as f32 * INV_TILE_EXTENT,
                    (z as f64 / 10.0 * inverse_scale) as f32,
                ));
            }
        }
        cnt += 1;
    }
    points
}

/// Decodes consecutive lines/rings, consuming entries of the shared index
/// array until a `0` end marker or the array's end.
fn parse_lines(
    it: &mut Cursor<'_>,
    indices: &[u32],
    idx: &mut usize,
    last_x: &mut i32,
    last_y: &mut i32,
) -> Vec<Line> {
    let mut lines = Vec::new();

    while *idx < indices.len() {
        let num_pts = indices[*idx];
        // polygon end marker
        if num_pts == 0 {
            break;
        }

        let pts = parse_points(it, num_pts, last_x, last_y);
        if pts.len() != num_pts as usize {
            warn!(
                declared = num_pts,
                decoded = pts.len(),
                "wrong number of points in ring"
            );
        }
        lines.push(pts);
        *idx += 1;
    }
    lines
}

/// Decodes consecutive polygons; each `0` in the index array closes one
/// polygon's ring list.
fn parse_polys(it: &mut Cursor<'_>, indices: &[u32], idx: &mut usize) -> Vec<Polygon> {
    let mut polys = Vec::new();
    let (mut last_x, mut last_y) = (0, 0);

    while *idx < indices.len() {
        if indices[*idx] == 0 {
            break;
        }
        polys.push(parse_lines(it, indices, idx, &mut last_x, &mut last_y));
        *idx += 1;
    }
    polys
}

/// Drains a packed unsigned-integer array field.
fn read_uint_array(mut it: Cursor<'_>, out: &mut Vec<u32>) {
    while it.has_more() {
        match it.int64() {
            Ok(value) => out.push(value),
            Err(err) => {
                warn!(error = %err, "integer array truncated");
                break;
            }
        }
    }
}

/// Drains the tag table field of `(key, value)` index pairs.
fn read_tag_pairs(mut it: Cursor<'_>, out: &mut Vec<TagId>) {
    while it.has_more() {
        let key = match it.varint() {
            Ok(key) => key as u32,
            Err(err) => {
                warn!(error = %err, "tag table truncated");
                break;
            }
        };
        let val = match it.varint() {
            Ok(val) => val as u32,
            Err(err) => {
                warn!(error = %err, "tag table truncated mid-pair");
                break;
            }
        };
        out.push(TagId { key, val });
    }
}

/// C-style `atoi`: parses the leading integer of a string, ignoring any
/// trailing garbage ("12m" reads as 12).
fn parse_leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.as_bytes().first() {
        Some(b'-') => (-1, &s[1..]),
        Some(b'+') => (1, &s[1..]),
        _ => (1, s),
    };

    let mut value: i64 = 0;
    for byte in digits.bytes() {
        if !byte.is_ascii_digit() {
            break;
        }
        value = value
            .saturating_mul(10)
            .saturating_add(i64::from(byte - b'0'));
    }
    sign * value
}
