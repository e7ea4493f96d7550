//! Tile coordinate types.

use std::cmp::Ordering;
use std::fmt;

use thiserror::Error;

/// Minimum supported zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Maximum supported zoom level.
pub const MAX_ZOOM: u8 = 18;

/// Minimum latitude representable in Web Mercator (degrees).
pub const MIN_LAT: f64 = -85.05112878;

/// Maximum latitude representable in Web Mercator (degrees).
pub const MAX_LAT: f64 = 85.05112878;

/// Minimum longitude (degrees).
pub const MIN_LON: f64 = -180.0;

/// Errors for coordinate conversions.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CoordError {
    /// Latitude outside the Web Mercator range.
    #[error("latitude {0} outside Web Mercator range")]
    InvalidLatitude(f64),

    /// Longitude outside [-180, 180].
    #[error("longitude {0} outside valid range")]
    InvalidLongitude(f64),

    /// Zoom level beyond the supported maximum.
    #[error("zoom {0} beyond supported maximum")]
    InvalidZoom(u8),
}

/// Identifier of one tile in the Web Mercator quadtree.
///
/// `x` grows eastward, `y` grows southward, `z` is the zoom level. The
/// ordering is total and sorts by `(z, x, y)`; the tile lifecycle manager
/// relies on this ordering for its merge-diff of sorted tile sets, so it
/// must match the ordering used by `View::visible_tiles()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileID {
    /// Column in the quadtree grid (0 to 2^z - 1, west to east).
    pub x: i32,
    /// Row in the quadtree grid (0 to 2^z - 1, north to south).
    pub y: i32,
    /// Zoom level.
    pub z: u8,
}

impl TileID {
    /// Creates a new tile identifier.
    pub fn new(x: i32, y: i32, z: u8) -> Self {
        Self { x, y, z }
    }

    /// Returns the parent tile, or `None` at the root.
    pub fn parent(&self) -> Option<TileID> {
        if self.z == MIN_ZOOM {
            return None;
        }
        Some(TileID::new(self.x >> 1, self.y >> 1, self.z - 1))
    }

    /// Returns the four child tiles one zoom level below this one.
    pub fn children(&self) -> [TileID; 4] {
        let x = self.x * 2;
        let y = self.y * 2;
        let z = self.z + 1;
        [
            TileID::new(x, y, z),
            TileID::new(x + 1, y, z),
            TileID::new(x, y + 1, z),
            TileID::new(x + 1, y + 1, z),
        ]
    }

    /// Returns this tile's hierarchy: every ancestor up to the root plus
    /// the immediate children, restricted to zoom levels in
    /// `[MIN_ZOOM, max_zoom]`.
    ///
    /// These are the tiles worth prefetching when this tile becomes
    /// visible: zooming out lands on an ancestor, zooming in lands on a
    /// child.
    pub fn hierarchy_tiles(&self, max_zoom: u8) -> Vec<TileID> {
        let mut tiles = Vec::new();

        let mut cursor = *self;
        while let Some(parent) = cursor.parent() {
            if parent.z <= max_zoom {
                tiles.push(parent);
            }
            cursor = parent;
        }

        if self.z < max_zoom {
            tiles.extend(self.children());
        }

        tiles
    }

    /// Returns true if `other` is a strict ancestor of this tile.
    pub fn is_ancestor(&self, other: &TileID) -> bool {
        if other.z >= self.z {
            return false;
        }
        let shift = (self.z - other.z) as u32;
        (self.x >> shift) == other.x && (self.y >> shift) == other.y
    }

    /// Returns true if `other` is a strict descendant of this tile.
    pub fn is_descendant(&self, other: &TileID) -> bool {
        other.is_ancestor(self)
    }
}

impl Ord for TileID {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.z, self.x, self.y).cmp(&(other.z, other.x, other.y))
    }
}

impl PartialOrd for TileID {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for TileID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.z, self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering_by_zoom_then_x_then_y() {
        let a = TileID::new(5, 5, 3);
        let b = TileID::new(0, 0, 4);
        assert!(a < b, "Lower zoom should order first");

        let c = TileID::new(1, 9, 4);
        let d = TileID::new(2, 0, 4);
        assert!(c < d, "Same zoom orders by x before y");

        let e = TileID::new(1, 2, 4);
        let f = TileID::new(1, 3, 4);
        assert!(e < f, "Same zoom and x orders by y");
    }

    #[test]
    fn test_equality_is_exact() {
        assert_eq!(TileID::new(3, 4, 5), TileID::new(3, 4, 5));
        assert_ne!(TileID::new(3, 4, 5), TileID::new(3, 4, 6));
    }

    #[test]
    fn test_parent_of_root_is_none() {
        assert_eq!(TileID::new(0, 0, 0).parent(), None);
    }

    #[test]
    fn test_parent_halves_coordinates() {
        let tile = TileID::new(5, 7, 3);
        let parent = tile.parent().unwrap();
        assert_eq!(parent, TileID::new(2, 3, 2));
    }

    #[test]
    fn test_children_cover_quad() {
        let tile = TileID::new(1, 2, 4);
        let children = tile.children();
        assert_eq!(children[0], TileID::new(2, 4, 5));
        assert_eq!(children[1], TileID::new(3, 4, 5));
        assert_eq!(children[2], TileID::new(2, 5, 5));
        assert_eq!(children[3], TileID::new(3, 5, 5));

        for child in &children {
            assert_eq!(child.parent().unwrap(), tile);
        }
    }

    #[test]
    fn test_hierarchy_contains_all_ancestors_and_children() {
        let tile = TileID::new(5, 7, 3);
        let hierarchy = tile.hierarchy_tiles(18);

        // 3 ancestors (z=2, 1, 0) + 4 children
        assert_eq!(hierarchy.len(), 7);
        assert!(hierarchy.contains(&TileID::new(2, 3, 2)));
        assert!(hierarchy.contains(&TileID::new(1, 1, 1)));
        assert!(hierarchy.contains(&TileID::new(0, 0, 0)));
        for child in tile.children() {
            assert!(hierarchy.contains(&child), "Missing child {}", child);
        }
    }

    #[test]
    fn test_hierarchy_respects_max_zoom() {
        let tile = TileID::new(5, 7, 3);
        let hierarchy = tile.hierarchy_tiles(3);

        // Children would be at zoom 4, beyond the cap
        assert_eq!(hierarchy.len(), 3);
        assert!(hierarchy.iter().all(|t| t.z <= 3));
    }

    #[test]
    fn test_is_ancestor() {
        let tile = TileID::new(5, 7, 3);
        assert!(tile.is_ancestor(&TileID::new(2, 3, 2)));
        assert!(tile.is_ancestor(&TileID::new(0, 0, 0)));
        assert!(!tile.is_ancestor(&TileID::new(1, 3, 2)));
        assert!(!tile.is_ancestor(&tile), "A tile is not its own ancestor");
    }

    #[test]
    fn test_display_format() {
        let tile = TileID::new(3, 4, 5);
        assert_eq!(format!("{}", tile), "[5, 3, 4]");
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_hierarchy_tiles_are_genuine_relatives(
                x_raw in 0i32..4096,
                y_raw in 0i32..4096,
                zoom in 0u8..=12,
                max_zoom in 0u8..=18
            ) {
                let max_coord = 2i32.pow(zoom as u32);
                let tile = TileID::new(x_raw % max_coord, y_raw % max_coord, zoom);

                for relative in tile.hierarchy_tiles(max_zoom) {
                    prop_assert!(
                        relative.z <= max_zoom,
                        "Hierarchy tile {} exceeds max zoom {}",
                        relative, max_zoom
                    );
                    prop_assert!(
                        tile.is_ancestor(&relative) || tile.is_descendant(&relative),
                        "Hierarchy tile {} is not related to {}",
                        relative, tile
                    );
                }
            }

            #[test]
            fn test_hierarchy_has_no_duplicates(
                x_raw in 0i32..4096,
                y_raw in 0i32..4096,
                zoom in 0u8..=12
            ) {
                let max_coord = 2i32.pow(zoom as u32);
                let tile = TileID::new(x_raw % max_coord, y_raw % max_coord, zoom);

                let hierarchy = tile.hierarchy_tiles(18);
                let unique: std::collections::BTreeSet<_> = hierarchy.iter().collect();
                prop_assert_eq!(unique.len(), hierarchy.len());
            }

            #[test]
            fn test_children_roundtrip_to_parent(
                x_raw in 0i32..4096,
                y_raw in 0i32..4096,
                zoom in 0u8..=17
            ) {
                let max_coord = 2i32.pow(zoom as u32);
                let tile = TileID::new(x_raw % max_coord, y_raw % max_coord, zoom);

                for child in tile.children() {
                    prop_assert_eq!(child.parent(), Some(tile));
                }
            }
        }
    }
}
