//! Playback pipeline: loader thread -> bounded queue -> player
//!
//! The [`Session`] owns the queue for one playback run. The loader runs on a
//! background thread and is the only producer; the player runs on the
//! calling thread and is the only consumer. Frames move by ownership from
//! the store to the display, so no buffer is ever shared.

pub mod loader;
pub mod player;
pub mod queue;

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{error, info, instrument, warn};

pub use loader::Loader;
pub use player::{Player, PlayerState};
pub use queue::{Closed, QueueStats, StreamQueue};

use crate::capture::EncodedFrame;
use crate::display::Display;
use crate::error::PlaybackError;
use crate::store::FrameStore;
use crate::{PipelineConfig, PlayerConfig};

/// Queue item: one frame tagged with its playback index
#[derive(Debug)]
pub struct Packet {
    pub index: u64,
    pub frame: EncodedFrame,
}

/// Outcome of one playback run
#[derive(Debug, Default)]
pub struct PlaybackReport {
    /// Frames written to the display
    pub delivered: u64,
    pub last_index: Option<u64>,
    /// Frames the loader managed to queue
    pub loaded: u64,
    /// Wall-clock duration of the player loop; diagnostic only
    pub elapsed: Duration,
    pub outcome: PlayerState,
    /// Loader faults first, then player faults
    pub faults: Vec<PlaybackError>,
    pub queue: QueueStats,
}

impl PlaybackReport {
    pub fn first_fault(&self) -> Option<&PlaybackError> {
        self.faults.first()
    }

    pub fn is_complete(&self) -> bool {
        self.outcome == PlayerState::Done && self.faults.is_empty()
    }

    /// Turn the first recorded fault into an error
    pub fn into_result(mut self) -> Result<Self, PlaybackError> {
        if self.faults.is_empty() {
            Ok(self)
        } else {
            Err(self.faults.remove(0))
        }
    }
}

/// Cooperative cancellation for a running session.
///
/// Stopping releases every queued frame and wakes both threads; the loader
/// and the player then leave their loops.
#[derive(Clone)]
pub struct StopHandle {
    queue: Arc<StreamQueue<Packet>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.queue.stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.queue.is_stopped()
    }
}

/// One playback run
pub struct Session {
    queue: Arc<StreamQueue<Packet>>,
    loader: Loader,
    player: Player,
    min_fill: usize,
}

impl Session {
    pub fn new(pipeline: &PipelineConfig, player: &PlayerConfig) -> Self {
        Self {
            queue: Arc::new(StreamQueue::new()),
            loader: Loader::new(pipeline.watermark),
            player: Player::from_config(player),
            min_fill: pipeline.min_fill,
        }
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Play frames 1..=total from `store` onto `display`.
    ///
    /// Playback starts once the queue holds `min(min_fill, watermark, total)`
    /// frames or the loader has finished early.
    #[instrument(skip_all, fields(total = total))]
    pub fn play(self, total: u64, store: &dyn FrameStore, display: &mut dyn Display) -> PlaybackReport {
        let queue = &*self.queue;
        let (fault_tx, fault_rx) = flume::unbounded();
        let fill = self
            .min_fill
            .min(self.loader.watermark().max(1))
            .min(usize::try_from(total).unwrap_or(usize::MAX));

        let mut report = thread::scope(|s| {
            let loader = self.loader;
            let spawned = thread::Builder::new()
                .name("termreel-loader".into())
                .spawn_scoped(s, move || loader.run(total, store, queue, &fault_tx));
            let handle = match spawned {
                Ok(handle) => handle,
                Err(e) => {
                    error!("Failed to spawn loader: {}", e);
                    // Nothing was loaded, so the first frame is the one lost
                    return PlaybackReport {
                        outcome: PlayerState::Failed,
                        faults: vec![PlaybackError::Spawn {
                            index: 1,
                            source: e,
                        }],
                        ..Default::default()
                    };
                }
            };

            let depth = queue.wait_for_depth(fill);
            info!("Queue primed with {} frames, starting playback", depth);

            let mut report = self.player.run(total, queue, display);

            // Unblocks the loader if the player left early
            queue.stop();

            report.loaded = match handle.join() {
                Ok(loaded) => loaded,
                Err(_) => {
                    let queued = queue.stats().pushed;
                    error!("Loader panicked after {} frames", queued);
                    report.faults.push(PlaybackError::LoaderPanicked { queued });
                    queued
                }
            };
            report
        });

        let mut faults: Vec<PlaybackError> = fault_rx.try_iter().collect();
        faults.append(&mut report.faults);
        report.faults = faults;
        report.queue = queue.stats();

        match report.first_fault() {
            Some(fault) => warn!(
                "Playback halted at frame {} ({}): {}",
                fault.index(),
                fault.kind(),
                fault
            ),
            None => info!(
                "Played {} frames in {:.3}s",
                report.delivered,
                report.elapsed.as_secs_f64()
            ),
        }
        report
    }
}
