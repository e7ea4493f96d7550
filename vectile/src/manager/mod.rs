//! Tile lifecycle manager.
//!
//! Maintains the authoritative set of tiles matching the current viewport.
//! Each update cycle runs on the controlling (render) thread and never
//! blocks: completed load jobs are collected by non-blocking polls, the
//! view's visible-tile set is diffed against the current tile set in one
//! sorted merge pass, and newly visible tiles are either promoted from the
//! prefetched buffer set or dispatched as asynchronous fetch+decode+style
//! jobs on the worker pool.
//!
//! Per-tile state machine: absent → pending → ready → evicted, with the
//! side path buffered → promoted for prefetched hierarchy tiles.
//!
//! Eviction never cancels an in-flight job; the job owns its tile and
//! delivers it through its own completion channel, where a result for an
//! already evicted tile is simply discarded.

mod worker;

pub use worker::{load_job, JobHandle, JobStatus, LoadJob};

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::coord::{MercatorProjection, TileID};
use crate::source::DataSource;
use crate::style::Style;
use crate::tile::MapTile;
use crate::view::View;

fn default_max_workers() -> usize {
    8
}

/// Tile manager configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Upper bound on concurrently executing load jobs.
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_workers: default_max_workers(),
        }
    }
}

impl ManagerConfig {
    /// Sets the worker pool size.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }
}

/// Observable state of one tile-set entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// In the set, load job not yet delivered.
    Pending,
    /// Fully loaded and styled.
    Ready,
}

enum TileEntry {
    Pending,
    Ready(Arc<MapTile>),
}

/// Both tile maps live behind one lock, taken per individual insert/erase
/// and never held across a whole update cycle.
#[derive(Default)]
struct TileSets {
    visible: BTreeMap<TileID, TileEntry>,
    buffered: BTreeMap<TileID, MapTile>,
}

/// The tile lifecycle manager.
///
/// Owned by the application context and driven once per render tick via
/// [`update_tile_set`](TileManager::update_tile_set). Data sources and
/// styles are registered up front; the view collaborator supplies the
/// visible-tile set.
pub struct TileManager {
    view: Arc<dyn View>,
    projection: MercatorProjection,
    sources: Vec<Arc<dyn DataSource>>,
    styles: Vec<Arc<dyn Style>>,
    sets: Mutex<TileSets>,
    incoming_tiles: Vec<LoadJob>,
    incoming_buffer_tiles: Vec<LoadJob>,
    runtime: Handle,
    workers: Arc<Semaphore>,
}

impl TileManager {
    /// Creates a manager bound to a view and a runtime for its jobs.
    pub fn new(view: Arc<dyn View>, config: ManagerConfig, runtime: Handle) -> Self {
        Self {
            view,
            projection: MercatorProjection::new(),
            sources: Vec::new(),
            styles: Vec::new(),
            sets: Mutex::new(TileSets::default()),
            incoming_tiles: Vec::new(),
            incoming_buffer_tiles: Vec::new(),
            runtime,
            workers: Arc::new(Semaphore::new(config.max_workers.max(1))),
        }
    }

    /// Registers a data source; sources are consulted in registration
    /// order for every tile.
    pub fn add_data_source(&mut self, source: Arc<dyn DataSource>) {
        self.sources.push(source);
    }

    /// Registers a style to run over every loaded tile.
    pub fn add_style(&mut self, style: Arc<dyn Style>) {
        self.styles.push(style);
    }

    /// Updates the visible tile set if necessary.
    ///
    /// Contacts the view to determine whether the set of visible tiles has
    /// changed; if so, constructs or disposes tiles as needed. Returns
    /// true if the tile set changed this cycle, which callers use to
    /// decide whether to re-render.
    pub fn update_tile_set(&mut self) -> bool {
        let mut tile_set_changed = false;

        // Check if any incoming visible tiles are finished
        let mut finished: Vec<MapTile> = Vec::new();
        self.incoming_tiles.retain_mut(|job| match job.poll() {
            JobStatus::Pending => true,
            JobStatus::Ready(tile) => {
                finished.push(*tile);
                false
            }
            JobStatus::Gone => {
                warn!(tile = %job.tile_id(), "visible tile job vanished without a result");
                false
            }
        });

        for tile in finished {
            let id = *tile.id();
            let retained = {
                let mut sets = self.sets.lock();
                match sets.visible.get_mut(&id) {
                    Some(entry) => {
                        *entry = TileEntry::Ready(Arc::new(tile));
                        true
                    }
                    None => false,
                }
            };

            if retained {
                info!(tile = %id, "visible tile finished loading");
                tile_set_changed = true;
                // Visible tile loaded; prefetch its hierarchy
                self.generate_buffer_tiles(id);
            } else {
                debug!(tile = %id, "discarding tile evicted while loading");
            }
        }

        // Finish processing all visible tiles before grabbing any buffer
        // tile: interactive tiles never wait behind prefetch.
        if self.incoming_tiles.is_empty() {
            let mut finished_buffer: Vec<MapTile> = Vec::new();
            self.incoming_buffer_tiles.retain_mut(|job| match job.poll() {
                JobStatus::Pending => true,
                JobStatus::Ready(tile) => {
                    finished_buffer.push(*tile);
                    false
                }
                JobStatus::Gone => {
                    warn!(tile = %job.tile_id(), "buffer tile job vanished without a result");
                    false
                }
            });

            for tile in finished_buffer {
                let id = *tile.id();
                debug!(tile = %id, "buffer tile finished loading");
                self.sets.lock().buffered.insert(id, tile);
            }
        }

        if !self.view.view_changed() && !tile_set_changed {
            // No new tiles have come into view and no tiles have finished
            // loading, so the tile set is unchanged
            return false;
        }

        let visible_tiles = self.view.visible_tiles();
        let current_tiles: Vec<TileID> = self.sets.lock().visible.keys().copied().collect();

        // Diff previously visible tile IDs with the new visible set; both
        // iterate in TileID order, merged in one linear pass.
        let mut current_iter = current_tiles.into_iter().peekable();
        let mut visible_iter = visible_tiles.into_iter().peekable();

        loop {
            match (current_iter.peek().copied(), visible_iter.peek().copied()) {
                (Some(in_set), Some(visible)) => {
                    if visible == in_set {
                        // Tiles match here, nothing to do
                        current_iter.next();
                        visible_iter.next();
                    } else if visible < in_set {
                        // The tile set is missing an element of the visible set
                        self.add_tile(visible);
                        visible_iter.next();
                        tile_set_changed = true;
                    } else {
                        // The visible set is missing an element of the tile set
                        self.remove_tile(in_set);
                        current_iter.next();
                        tile_set_changed = true;
                    }
                }
                (Some(in_set), None) => {
                    self.remove_tile(in_set);
                    current_iter.next();
                    tile_set_changed = true;
                }
                (None, Some(visible)) => {
                    self.add_tile(visible);
                    visible_iter.next();
                    tile_set_changed = true;
                }
                (None, None) => break,
            }
        }

        tile_set_changed
    }

    /// Snapshot of all ready tiles, for rendering.
    pub fn ready_tiles(&self) -> Vec<Arc<MapTile>> {
        self.sets
            .lock()
            .visible
            .values()
            .filter_map(|entry| match entry {
                TileEntry::Ready(tile) => Some(tile.clone()),
                TileEntry::Pending => None,
            })
            .collect()
    }

    /// State of one tile-set entry, if present.
    pub fn tile_state(&self, id: &TileID) -> Option<TileState> {
        self.sets.lock().visible.get(id).map(|entry| match entry {
            TileEntry::Pending => TileState::Pending,
            TileEntry::Ready(_) => TileState::Ready,
        })
    }

    /// Number of entries in the visible tile set (pending or ready).
    pub fn visible_tile_count(&self) -> usize {
        self.sets.lock().visible.len()
    }

    /// Number of prefetched tiles waiting in the buffer set.
    pub fn buffered_tile_count(&self) -> usize {
        self.sets.lock().buffered.len()
    }

    /// Number of in-flight visible-tile jobs.
    pub fn in_flight_count(&self) -> usize {
        self.incoming_tiles.len()
    }

    /// Number of in-flight buffer-tile jobs.
    pub fn in_flight_buffer_count(&self) -> usize {
        self.incoming_buffer_tiles.len()
    }

    /// Drops every tile and signals cancellation intent to in-flight
    /// jobs. Used on reset or low-memory conditions.
    pub fn clear(&mut self) {
        for job in &self.incoming_tiles {
            job.request_cancel();
        }
        for job in &self.incoming_buffer_tiles {
            job.request_cancel();
        }
        self.incoming_tiles.clear();
        self.incoming_buffer_tiles.clear();

        let mut sets = self.sets.lock();
        sets.visible.clear();
        sets.buffered.clear();
    }

    fn add_tile(&mut self, id: TileID) {
        // A buffered tile is promoted instead of fetched again
        let buffered = self.sets.lock().buffered.remove(&id);

        if let Some(tile) = buffered {
            info!(tile = %id, "promoting buffered tile into visible set");
            self.sets.lock().visible.insert(id, TileEntry::Pending);
            let job = self.spawn_promotion_job(tile);
            self.incoming_tiles.push(job);
            return;
        }

        self.sets.lock().visible.insert(id, TileEntry::Pending);
        debug!(tile = %id, "loading tile");
        let job = self.spawn_load_job(id);
        self.incoming_tiles.push(job);
    }

    fn remove_tile(&mut self, id: TileID) {
        debug!(tile = %id, "evicting tile");
        self.sets.lock().visible.remove(&id);
        // An in-flight job for this tile keeps running; its result is
        // discarded at the next poll.
    }

    /// Dispatches data-only prefetch jobs for a loaded tile's quadtree
    /// hierarchy. One in-flight job per TileID; tiles already buffered are
    /// skipped.
    fn generate_buffer_tiles(&mut self, origin: TileID) {
        let hierarchy = origin.hierarchy_tiles(self.view.max_zoom());

        for id in hierarchy {
            if self.sets.lock().buffered.contains_key(&id) {
                continue;
            }
            if self.incoming_buffer_tiles.iter().any(|job| *job.tile_id() == id) {
                continue;
            }

            debug!(buffer_tile = %id, origin = %origin, "loading buffer tile");
            let job = self.spawn_buffer_job(id);
            self.incoming_buffer_tiles.push(job);
        }
    }

    /// Spawns a full load job: fetch and decode from each source in
    /// order, then build every style's mesh.
    fn spawn_load_job(&self, id: TileID) -> LoadJob {
        let (job, handle) = load_job(id);
        let sources = self.sources.clone();
        let styles = self.styles.clone();
        let projection = self.projection;
        let workers = self.workers.clone();

        self.runtime.spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };

            let mut tile = MapTile::new(id, projection);
            for source in &sources {
                if handle.is_cancelled() {
                    debug!(tile = %id, "load cancelled before completion");
                    break;
                }
                if !source.supports_zoom(id.z) {
                    continue;
                }

                if let Err(err) = source.load_tile_data(&tile).await {
                    error!(source = source.name(), tile = %id, error = %err, "loading failed for tile");
                    continue;
                }
                if let Some(data) = source.get_tile_data(&id) {
                    tile.set_data(data.clone());
                    for style in &styles {
                        style.add_data(&data, &mut tile, &projection);
                    }
                }
            }
            handle.finish(tile);
        });

        job
    }

    /// Spawns a data-only prefetch job; buffer tiles are not styled until
    /// promoted.
    fn spawn_buffer_job(&self, id: TileID) -> LoadJob {
        let (job, handle) = load_job(id);
        let sources = self.sources.clone();
        let projection = self.projection;
        let workers = self.workers.clone();

        self.runtime.spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };

            let mut tile = MapTile::new(id, projection);
            for source in &sources {
                if handle.is_cancelled() {
                    debug!(tile = %id, "buffer load cancelled before completion");
                    break;
                }
                if !source.supports_zoom(id.z) {
                    continue;
                }

                if let Err(err) = source.load_tile_data(&tile).await {
                    error!(source = source.name(), tile = %id, error = %err, "loading failed for buffer tile");
                    continue;
                }
                if let Some(data) = source.get_tile_data(&id) {
                    tile.set_data(data.clone());
                }
            }
            handle.finish(tile);
        });

        job
    }

    /// Spawns the style/mesh-build step for an already fetched buffer
    /// tile. No network work happens here.
    fn spawn_promotion_job(&self, tile: MapTile) -> LoadJob {
        let id = *tile.id();
        let (job, handle) = load_job(id);
        let sources = self.sources.clone();
        let styles = self.styles.clone();
        let projection = self.projection;
        let workers = self.workers.clone();

        self.runtime.spawn(async move {
            let Ok(_permit) = workers.acquire_owned().await else {
                return;
            };

            let mut tile = tile;
            for source in &sources {
                // Data was already fetched when the tile was buffered
                if let Some(data) = source.get_tile_data(&id) {
                    tile.set_data(data.clone());
                    for style in &styles {
                        style.add_data(&data, &mut tile, &projection);
                    }
                }
            }
            handle.finish(tile);
        });

        job
    }
}
