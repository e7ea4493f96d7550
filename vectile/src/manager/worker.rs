//! Worker slot: one in-flight asynchronous tile load.
//!
//! A load job is split into two ends. The [`LoadJob`] stays with the
//! manager, which polls it without blocking each update cycle; the
//! [`JobHandle`] travels into the spawned task, which finishes by sending
//! its fully built tile through the job's own completion channel. The task
//! never holds a reference into the manager's maps, so a job completing
//! after its tile was evicted is discarded harmlessly at the next poll.
//!
//! Cancellation is an intent flag only: the task checks it between load
//! steps and may finish anyway.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;

use crate::coord::TileID;
use crate::tile::MapTile;

/// Non-blocking poll outcome for one job.
#[derive(Debug)]
pub enum JobStatus {
    /// Still in flight.
    Pending,
    /// Finished; the job's tile.
    Ready(Box<MapTile>),
    /// The task went away without delivering a result.
    Gone,
}

/// Manager-side handle of one in-flight tile load.
#[derive(Debug)]
pub struct LoadJob {
    tile_id: TileID,
    receiver: oneshot::Receiver<MapTile>,
    cancel: Arc<AtomicBool>,
}

/// Task-side handle of one in-flight tile load.
#[derive(Debug)]
pub struct JobHandle {
    sender: oneshot::Sender<MapTile>,
    cancel: Arc<AtomicBool>,
}

/// Creates the two ends of one load job.
pub fn load_job(tile_id: TileID) -> (LoadJob, JobHandle) {
    let (sender, receiver) = oneshot::channel();
    let cancel = Arc::new(AtomicBool::new(false));

    let job = LoadJob {
        tile_id,
        receiver,
        cancel: cancel.clone(),
    };
    let handle = JobHandle { sender, cancel };
    (job, handle)
}

impl LoadJob {
    /// The tile this job is loading.
    pub fn tile_id(&self) -> &TileID {
        &self.tile_id
    }

    /// Polls for completion without blocking.
    pub fn poll(&mut self) -> JobStatus {
        match self.receiver.try_recv() {
            Ok(tile) => JobStatus::Ready(Box::new(tile)),
            Err(TryRecvError::Empty) => JobStatus::Pending,
            Err(TryRecvError::Closed) => JobStatus::Gone,
        }
    }

    /// Signals cancellation intent. Best-effort: the task observes the
    /// flag between load steps and may still deliver a result.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Returns true if cancellation was requested.
    pub fn is_cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

impl JobHandle {
    /// Returns true if the manager requested cancellation.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Delivers the finished tile. The manager may already have evicted
    /// the tile and dropped the receiver; that result is simply lost.
    pub fn finish(self, tile: MapTile) {
        let _ = self.sender.send(tile);
    }
}
