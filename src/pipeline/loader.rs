//! Background stage: store -> queue

use flume::Sender;
use tracing::{debug, error, info, instrument};

use super::queue::StreamQueue;
use super::Packet;
use crate::capture::EncodedFrame;
use crate::error::PlaybackError;
use crate::store::FrameStore;

/// Closes the queue however the loader exits, so the player never waits on
/// a producer that is gone
struct CloseOnDrop<'a, T>(&'a StreamQueue<T>);

impl<T> Drop for CloseOnDrop<'_, T> {
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Sequentially fetches frames 1..=total and feeds them to the queue
#[derive(Debug, Clone, Copy)]
pub struct Loader {
    watermark: usize,
}

impl Loader {
    pub fn new(watermark: usize) -> Self {
        Self { watermark }
    }

    pub fn watermark(&self) -> usize {
        self.watermark
    }

    /// Returns the number of frames enqueued.
    ///
    /// A read failure is sent on `faults` and ends the run; frames already
    /// queued stay playable.
    #[instrument(skip_all, fields(total = total, watermark = self.watermark))]
    pub fn run(
        &self,
        total: u64,
        store: &dyn FrameStore,
        queue: &StreamQueue<Packet>,
        faults: &Sender<PlaybackError>,
    ) -> u64 {
        let _close = CloseOnDrop(queue);
        let mut queued = 0;

        for index in 1..=total {
            let data = match store.get(index) {
                Ok(data) => data,
                Err(e) => {
                    error!("Failed to load frame {}: {}", index, e);
                    if faults.send(PlaybackError::Store(e)).is_err() {
                        debug!("Fault channel closed");
                    }
                    return queued;
                }
            };

            let packet = Packet {
                index,
                frame: EncodedFrame::new(data),
            };
            if queue.wait_and_push(self.watermark, packet).is_err() {
                info!("Queue stopped, loader exiting after {} frames", queued);
                return queued;
            }

            queued += 1;
            metrics::counter!("frames_loaded").increment(1);
        }

        debug!("Loaded all {} frames", queued);
        queued
    }
}
