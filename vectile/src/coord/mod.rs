//! Tile coordinate module
//!
//! Provides the quadtree tile addressing scheme used by vector tile servers
//! (Web Mercator XYZ), conversions between geographic coordinates and tile
//! coordinates, and the per-tile scale factors used to convert encoded
//! heights into world units.

mod types;

pub use types::{CoordError, TileID, MAX_LAT, MAX_ZOOM, MIN_LAT, MIN_LON, MIN_ZOOM};

use std::f64::consts::PI;

/// Circumference of the Earth at the equator in meters (WGS84).
pub const EARTH_CIRCUMFERENCE: f64 = 40_075_016.685_578_49;

/// Converts geographic coordinates to a tile coordinate.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees (-85.05112878 to 85.05112878)
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 18)
///
/// # Returns
///
/// A `Result` containing the tile coordinate or an error if inputs are invalid.
#[inline]
pub fn to_tile_id(lat: f64, lon: f64, zoom: u8) -> Result<TileID, CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=180.0).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);

    let x = ((lon + 180.0) / 360.0 * n) as i32;

    let lat_rad = lat * PI / 180.0;
    let y = ((1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n) as i32;

    Ok(TileID::new(x, y, zoom))
}

/// Converts geographic coordinates to fractional tile coordinates.
///
/// The integer parts are the containing tile's `x`/`y`; the fractional
/// parts locate the position within that tile (0 at the tile's
/// north/west edge).
#[inline]
pub fn to_fractional_tile(lat: f64, lon: f64, zoom: u8) -> Result<(f64, f64), CoordError> {
    if !(MIN_LAT..=MAX_LAT).contains(&lat) {
        return Err(CoordError::InvalidLatitude(lat));
    }
    if !(MIN_LON..=180.0).contains(&lon) {
        return Err(CoordError::InvalidLongitude(lon));
    }
    if zoom > MAX_ZOOM {
        return Err(CoordError::InvalidZoom(zoom));
    }

    let n = 2.0_f64.powi(zoom as i32);

    let fx = (lon + 180.0) / 360.0 * n;

    let lat_rad = lat * PI / 180.0;
    let fy = (1.0 - lat_rad.tan().asinh() / PI) / 2.0 * n;

    Ok((fx, fy))
}

/// Converts a tile coordinate back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner.
#[inline]
pub fn tile_to_lat_lon(tile: &TileID) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.z as i32);

    let lon = tile.x as f64 / n * 360.0 - 180.0;

    let y = tile.y as f64 / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    let lat = lat_rad * 180.0 / PI;

    (lat, lon)
}

/// Returns the latitude of the tile's center in degrees.
#[inline]
pub fn tile_center_lat(tile: &TileID) -> f64 {
    let n = 2.0_f64.powi(tile.z as i32);

    let y = (tile.y as f64 + 0.5) / n;
    let lat_rad = (PI * (1.0 - 2.0 * y)).sinh().atan();
    lat_rad * 180.0 / PI
}

/// Web Mercator projection parameters shared by all tiles of one map.
///
/// The projection is stateless; it exists as a value so collaborators that
/// need projection-dependent factors (styles, the decoder) can receive it
/// explicitly instead of reaching for globals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MercatorProjection;

impl MercatorProjection {
    /// Creates the projection.
    pub fn new() -> Self {
        Self
    }

    /// Returns the tile's scale: meters covered by one half of the tile's
    /// extent at the tile's center latitude.
    ///
    /// At the equator at zoom 0 this is exactly half the Earth's
    /// circumference; it shrinks with `cos(latitude)` and halves with each
    /// zoom level.
    pub fn tile_scale(&self, tile: &TileID) -> f64 {
        let lat_rad = tile_center_lat(tile) * PI / 180.0;
        lat_rad.cos() * EARTH_CIRCUMFERENCE / 2.0_f64.powi(tile.z as i32 + 1)
    }
}
