//! Built-in static key/value dictionary for compact tag encoding.
//!
//! The tile format reserves indices below [`ATTRIB_OFFSET`] for a fixed
//! dictionary of common OSM attribute keys and values, so frequent tags
//! cost one small varint on the wire instead of an interned string per
//! tile. Indices at or above the offset address the tile's own dynamic
//! key/value tables.

/// First index that addresses a tile's dynamic string table.
pub const ATTRIB_OFFSET: u32 = 1024;

/// Sentinel returned for any index that resolves to neither table.
pub const INVALID: &str = "invalid";

/// Static attribute keys, ordered by wire index.
pub static KEYS: &[&str] = &[
    "access",
    "addr:housename",
    "addr:housenumber",
    "addr:interpolation",
    "admin_level",
    "aerialway",
    "aeroway",
    "amenity",
    "area",
    "barrier",
    "bicycle",
    "boundary",
    "brand",
    "bridge",
    "building",
    "construction",
    "covered",
    "culvert",
    "cutting",
    "denomination",
    "disused",
    "embankment",
    "foot",
    "generator:source",
    "harbour",
    "height",
    "highway",
    "historic",
    "horse",
    "intermittent",
    "junction",
    "landuse",
    "layer",
    "leisure",
    "lock",
    "man_made",
    "military",
    "min_height",
    "motorcar",
    "name",
    "natural",
    "oneway",
    "operator",
    "place",
    "population",
    "power",
    "power_source",
    "public_transport",
    "railway",
    "ref",
    "religion",
    "roof",
    "route",
    "service",
    "shop",
    "sport",
    "surface",
    "toll",
    "tourism",
    "tower:type",
    "tracktype",
    "tunnel",
    "water",
    "waterway",
    "wetland",
    "width",
    "wood",
];

/// Static attribute values, ordered by wire index.
pub static VALUES: &[&str] = &[
    "yes",
    "no",
    "residential",
    "service",
    "unclassified",
    "stream",
    "track",
    "water",
    "footway",
    "tertiary",
    "private",
    "tree",
    "path",
    "forest",
    "secondary",
    "house",
    "apartments",
    "industrial",
    "tower",
    "motorway",
    "primary",
    "trunk",
    "grass",
    "cycleway",
    "parking",
    "farmland",
    "motorway_link",
    "trunk_link",
    "primary_link",
    "secondary_link",
    "tertiary_link",
    "fence",
    "wood",
    "meadow",
    "wall",
    "commercial",
    "retail",
    "scrub",
    "garage",
    "riverbank",
    "river",
    "living_street",
    "pedestrian",
    "steps",
    "hedge",
    "coastline",
    "canal",
    "pitch",
    "park",
    "wetland",
    "sand",
    "beach",
    "village",
    "hamlet",
    "town",
    "city",
    "roof",
    "detached",
    "terrace",
    "school",
];

/// Number of entries in the static key dictionary.
pub const MAX_KEY: u32 = KEYS.len() as u32;

/// Number of entries in the static value dictionary.
pub const MAX_VAL: u32 = VALUES.len() as u32;

/// Resolves an attribute key index against the static dictionary or the
/// tile's dynamic key table.
pub fn resolve_key<'a>(index: u32, dynamic: &'a [String]) -> &'a str {
    if index < ATTRIB_OFFSET {
        if index < MAX_KEY {
            return KEYS[index as usize];
        }
    } else {
        let dynamic_index = (index - ATTRIB_OFFSET) as usize;
        if let Some(key) = dynamic.get(dynamic_index) {
            return key;
        }
    }
    INVALID
}

/// Resolves an attribute value index against the static dictionary or the
/// tile's dynamic value table.
pub fn resolve_value<'a>(index: u32, dynamic: &'a [String]) -> &'a str {
    if index < ATTRIB_OFFSET {
        if index < MAX_VAL {
            return VALUES[index as usize];
        }
    } else {
        let dynamic_index = (index - ATTRIB_OFFSET) as usize;
        if let Some(value) = dynamic.get(dynamic_index) {
            return value;
        }
    }
    INVALID
}
