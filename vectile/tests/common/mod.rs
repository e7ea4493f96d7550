//! Shared helpers for integration tests: a minimal VTM tile encoder, a
//! scripted fetcher, a scriptable view and a vertex-counting style.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use bytes::Bytes;

use vectile::coord::TileID;
use vectile::geometry::{Geometry, TileData};
use vectile::source::{BoxFuture, FetchError, HttpFetcher};
use vectile::style::Style;
use vectile::tile::{MapTile, MeshBuffer};
use vectile::view::View;
use vectile::MercatorProjection;

// ============================================================================
// Wire encoder
// ============================================================================

pub mod enc {
    pub const WIRE_VARINT: u8 = 0;
    pub const WIRE_LENGTH: u8 = 2;

    pub fn varint(out: &mut Vec<u8>, mut value: u64) {
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                out.push(byte);
                return;
            }
            out.push(byte | 0x80);
        }
    }

    pub fn svarint(out: &mut Vec<u8>, value: i64) {
        varint(out, ((value << 1) ^ (value >> 63)) as u64);
    }

    pub fn key(out: &mut Vec<u8>, tag: u32, wire_type: u8) {
        varint(out, (u64::from(tag) << 3) | u64::from(wire_type));
    }

    pub fn bytes_field(out: &mut Vec<u8>, tag: u32, payload: &[u8]) {
        key(out, tag, WIRE_LENGTH);
        varint(out, payload.len() as u64);
        out.extend_from_slice(payload);
    }

    pub fn varint_field(out: &mut Vec<u8>, tag: u32, value: u64) {
        key(out, tag, WIRE_VARINT);
        varint(out, value);
    }
}

// Static dictionary indices (see the decoder's built-in tables).
pub const KEY_HIGHWAY: u64 = 26;
pub const KEY_NAME: u64 = 39;
pub const KEY_NATURAL: u64 = 40;
pub const VAL_YES: u64 = 0;
pub const VAL_WATER: u64 = 7;
pub const VAL_MOTORWAY: u64 = 19;

const TAG_TAGS: u32 = 16;
const TAG_ELEM_LINES: u32 = 21;
const TAG_ELEM_POLY: u32 = 22;
const ELEM_NUM_INDICES: u32 = 1;
const ELEM_NUM_TAGS: u32 = 2;
const ELEM_TAGS: u32 = 11;
const ELEM_INDICES: u32 = 12;
const ELEM_COORDINATES: u32 = 13;

fn uint_array(tag: u32, values: &[u64]) -> Vec<u8> {
    let mut body = Vec::new();
    for v in values {
        enc::varint(&mut body, *v);
    }
    let mut out = Vec::new();
    enc::bytes_field(&mut out, tag, &body);
    out
}

fn feature(tag_indices: &[u64], indices: &[u64], deltas: &[i64]) -> Vec<u8> {
    let mut body = Vec::new();
    enc::varint_field(&mut body, ELEM_NUM_INDICES, indices.len() as u64);
    enc::varint_field(&mut body, ELEM_NUM_TAGS, tag_indices.len() as u64);
    body.extend_from_slice(&uint_array(ELEM_TAGS, tag_indices));
    body.extend_from_slice(&uint_array(ELEM_INDICES, indices));

    let mut coords = Vec::new();
    for d in deltas {
        enc::svarint(&mut coords, *d);
    }
    let mut coord_field = Vec::new();
    enc::bytes_field(&mut coord_field, ELEM_COORDINATES, &coords);
    body.extend_from_slice(&coord_field);
    body
}

/// A representative tile: one water polygon, one motorway line, and one
/// unclassified feature that decodes into the fallback earth quad.
///
/// Tag table: 0 = natural=water, 1 = highway=motorway, 2 = name=yes.
pub fn sample_tile_payload() -> Bytes {
    let mut tags_body = Vec::new();
    for (key, val) in [
        (KEY_NATURAL, VAL_WATER),
        (KEY_HIGHWAY, VAL_MOTORWAY),
        (KEY_NAME, VAL_YES),
    ] {
        enc::varint(&mut tags_body, key);
        enc::varint(&mut tags_body, val);
    }

    // 4-byte framing header, skipped by the decoder
    let mut out = vec![0u8; 4];
    enc::bytes_field(&mut out, TAG_TAGS, &tags_body);

    // Water: one square ring
    out_extend_group(
        &mut out,
        TAG_ELEM_POLY,
        &feature(&[0], &[4, 0], &[0, 0, 1024, 0, 0, 1024, -1024, 0]),
    );
    // Road: one two-point line
    out_extend_group(&mut out, TAG_ELEM_LINES, &feature(&[1], &[2], &[0, 0, 2048, 2048]));
    // Unclassified: becomes the earth fallback
    out_extend_group(
        &mut out,
        TAG_ELEM_POLY,
        &feature(&[2], &[4, 0], &[0, 0, 64, 0, 0, 64, -64, 0]),
    );

    Bytes::from(out)
}

fn out_extend_group(out: &mut Vec<u8>, group_tag: u32, feature_body: &[u8]) {
    enc::bytes_field(out, group_tag, feature_body);
}

// ============================================================================
// Test doubles
// ============================================================================

/// Fetcher serving one canned payload for every URL, with counters.
pub struct TestFetcher {
    response: Result<Bytes, FetchError>,
    fetch_count: AtomicUsize,
    requested: Mutex<Vec<String>>,
}

impl TestFetcher {
    pub fn new(response: Result<Bytes, FetchError>) -> Self {
        Self {
            response,
            fetch_count: AtomicUsize::new(0),
            requested: Mutex::new(Vec::new()),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

impl HttpFetcher for TestFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        self.requested.lock().unwrap().push(url.to_string());
        let response = self.response.clone();
        Box::pin(async move { response })
    }
}

/// Scriptable view: set the visible tiles; the next `view_changed()`
/// reports true once.
pub struct TestView {
    tiles: Mutex<BTreeSet<TileID>>,
    changed: Mutex<bool>,
    max_zoom: u8,
}

impl TestView {
    pub fn new(tiles: impl IntoIterator<Item = TileID>, max_zoom: u8) -> Self {
        Self {
            tiles: Mutex::new(tiles.into_iter().collect()),
            changed: Mutex::new(true),
            max_zoom,
        }
    }

    pub fn set_visible(&self, tiles: impl IntoIterator<Item = TileID>) {
        *self.tiles.lock().unwrap() = tiles.into_iter().collect();
        *self.changed.lock().unwrap() = true;
    }
}

impl View for TestView {
    fn view_changed(&self) -> bool {
        std::mem::take(&mut *self.changed.lock().unwrap())
    }

    fn visible_tiles(&self) -> BTreeSet<TileID> {
        self.tiles.lock().unwrap().clone()
    }

    fn max_zoom(&self) -> u8 {
        self.max_zoom
    }
}

/// Style collecting every decoded coordinate into one mesh buffer.
pub struct TestStyle {
    name: String,
    calls: AtomicUsize,
}

impl TestStyle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Style for TestStyle {
    fn name(&self) -> &str {
        &self.name
    }

    fn add_data(&self, data: &TileData, tile: &mut MapTile, _projection: &MercatorProjection) {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut mesh = MeshBuffer::new();
        for layer in &data.layers {
            for feature in &layer.features {
                match &feature.geometry {
                    Geometry::Points(points) => {
                        mesh.vertices.extend(points.iter().map(|p| [p.x, p.y, p.z]));
                    }
                    Geometry::Lines(lines) => {
                        for line in lines {
                            mesh.vertices.extend(line.iter().map(|p| [p.x, p.y, p.z]));
                        }
                    }
                    Geometry::Polygons(polygons) => {
                        for polygon in polygons {
                            for ring in polygon {
                                mesh.vertices.extend(ring.iter().map(|p| [p.x, p.y, p.z]));
                            }
                        }
                    }
                    Geometry::Mesh { vertices, indices } => {
                        mesh.vertices.extend(vertices.iter().map(|p| [p.x, p.y, p.z]));
                        mesh.indices.extend_from_slice(indices);
                    }
                }
            }
        }
        tile.insert_mesh(self.name.clone(), mesh);
    }
}

