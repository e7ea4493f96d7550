//! View collaborator boundary.
//!
//! The view owns the camera and decides which tiles the viewport needs;
//! the tile lifecycle manager only consumes its answers. The visible set
//! must iterate in [`TileID`] order — the manager's merge-diff against its
//! own sorted tile set silently misbehaves otherwise, which is why the
//! interface hands back a `BTreeSet` rather than a plain list.

use std::collections::BTreeSet;

use crate::coord::{TileID, MAX_ZOOM};

/// Provider of the current visible-tile set.
pub trait View: Send + Sync {
    /// Returns true if the viewport changed since the last call.
    ///
    /// The manager uses this as its fast-path skip: an unchanged view with
    /// no completed jobs means no tile-set work this tick.
    fn view_changed(&self) -> bool;

    /// The tiles the viewport currently needs, in `TileID` order.
    fn visible_tiles(&self) -> BTreeSet<TileID>;

    /// Upper zoom bound for hierarchy/buffer tile generation.
    fn max_zoom(&self) -> u8 {
        MAX_ZOOM
    }
}
