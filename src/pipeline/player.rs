//! Foreground stage: queue -> display

use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, instrument, trace};

use super::queue::StreamQueue;
use super::{Packet, PlaybackReport};
use crate::display::Display;
use crate::error::PlaybackError;
use crate::PlayerConfig;

/// Where the player is within one iteration, or how it ended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlayerState {
    #[default]
    AwaitingFrame,
    Writing,
    Released,
    /// All requested frames were delivered
    Done,
    /// The queue ended early: loader failure or stop signal
    Stopped,
    /// Display error or sequence violation
    Failed,
}

impl PlayerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Stopped | Self::Failed)
    }
}

/// Deadline-based frame pacing; sleeps only when ahead of schedule
struct Pacer {
    interval: Duration,
    next: Option<Instant>,
}

impl Pacer {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: None,
        }
    }

    fn wait(&mut self) {
        let now = Instant::now();
        let deadline = *self.next.get_or_insert(now);
        if deadline > now {
            thread::sleep(deadline - now);
        }
        // Running late resets the schedule instead of bursting to catch up
        self.next = Some(deadline.max(now) + self.interval);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Player {
    frame_interval: Option<Duration>,
}

impl Player {
    /// Unpaced: frames go out as fast as the queue and display allow
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_frame_interval(interval: Duration) -> Self {
        Self {
            frame_interval: Some(interval),
        }
    }

    pub fn from_config(config: &PlayerConfig) -> Self {
        match config.target_fps {
            Some(fps) if fps > 0.0 => Self::with_frame_interval(Duration::from_secs_f64(1.0 / fps)),
            _ => Self::new(),
        }
    }

    pub fn frame_interval(&self) -> Option<Duration> {
        self.frame_interval
    }

    /// Pop and display up to `total` frames in strict index order.
    ///
    /// Stops early without error when the queue ends (loader finished short
    /// or the session was stopped).
    #[instrument(skip_all, fields(total = total))]
    pub fn run(
        &self,
        total: u64,
        queue: &StreamQueue<Packet>,
        display: &mut dyn Display,
    ) -> PlaybackReport {
        let started = Instant::now();
        let mut pacer = self.frame_interval.map(Pacer::new);
        let mut report = PlaybackReport::default();
        let mut state = PlayerState::AwaitingFrame;

        while report.delivered < total {
            set_state(&mut state, PlayerState::AwaitingFrame);
            let Some(packet) = queue.pop() else {
                info!("Queue ended after {} frames", report.delivered);
                set_state(&mut state, PlayerState::Stopped);
                break;
            };

            // Indices must be contiguous from whichever frame arrives first
            let expected = report.last_index.map_or(packet.index, |last| last + 1);
            if packet.index != expected {
                error!("Out of order frame {} (expected {})", packet.index, expected);
                report.faults.push(PlaybackError::OutOfOrder {
                    expected,
                    found: packet.index,
                });
                set_state(&mut state, PlayerState::Failed);
                break;
            }

            if let Some(pacer) = pacer.as_mut() {
                pacer.wait();
            }

            set_state(&mut state, PlayerState::Writing);
            let write_start = Instant::now();
            let written = display.write(packet.frame.as_bytes());
            metrics::histogram!("frame_write_time_us")
                .record(write_start.elapsed().as_micros() as f64);

            let Packet { index, frame } = packet;
            drop(frame);
            set_state(&mut state, PlayerState::Released);

            if let Err(source) = written {
                error!("Display write failed at frame {}: {}", index, source);
                report.faults.push(PlaybackError::Display { index, source });
                set_state(&mut state, PlayerState::Failed);
                break;
            }

            report.delivered += 1;
            report.last_index = Some(index);
            metrics::counter!("frames_delivered").increment(1);
            metrics::gauge!("queue_depth").set(queue.size() as f64);
        }

        if !state.is_terminal() {
            set_state(&mut state, PlayerState::Done);
        }
        report.outcome = state;
        report.elapsed = started.elapsed();

        debug!(
            "Player finished: {:?}, {} frames in {:.3}s",
            report.outcome,
            report.delivered,
            report.elapsed.as_secs_f64()
        );
        report
    }
}

fn set_state(state: &mut PlayerState, next: PlayerState) {
    trace!(from = ?*state, to = ?next, "Player state");
    *state = next;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::EncodedFrame;
    use crate::display::TerminalDisplay;
    use crate::error::DisplayWriteError;

    fn packet(index: u64) -> Packet {
        Packet {
            index,
            frame: EncodedFrame::new(format!("<{index}>")),
        }
    }

    struct FailAt {
        at: u64,
        seen: u64,
    }

    impl Display for FailAt {
        fn write(&mut self, _bytes: &[u8]) -> Result<(), DisplayWriteError> {
            self.seen += 1;
            if self.seen == self.at {
                return Err(DisplayWriteError::Closed);
            }
            Ok(())
        }
    }

    #[test]
    fn delivers_in_order_then_done() {
        let queue = StreamQueue::new();
        for i in 1..=3 {
            queue.push(packet(i)).unwrap();
        }
        let mut display = TerminalDisplay::new(Vec::new());

        let report = Player::new().run(3, &queue, &mut display);

        assert_eq!(report.outcome, PlayerState::Done);
        assert_eq!(report.delivered, 3);
        assert_eq!(report.last_index, Some(3));
        assert!(report.faults.is_empty());
        assert_eq!(display.into_inner(), b"<1><2><3>");
    }

    #[test]
    fn closed_queue_stops_early() {
        let queue = StreamQueue::new();
        queue.push(packet(1)).unwrap();
        queue.close();
        let mut display = TerminalDisplay::new(Vec::new());

        let report = Player::new().run(5, &queue, &mut display);

        assert_eq!(report.outcome, PlayerState::Stopped);
        assert_eq!(report.delivered, 1);
    }

    #[test]
    fn display_error_fails_and_names_frame() {
        let queue = StreamQueue::new();
        for i in 1..=4 {
            queue.push(packet(i)).unwrap();
        }

        let report = Player::new().run(4, &queue, &mut FailAt { at: 2, seen: 0 });

        assert_eq!(report.outcome, PlayerState::Failed);
        assert_eq!(report.delivered, 1);
        let fault = &report.faults[0];
        assert_eq!(fault.index(), 2);
        assert_eq!(fault.kind(), "DisplayWriteError");
        // frames 3 and 4 were never touched
        assert_eq!(queue.size(), 2);
    }

    #[test]
    fn out_of_order_packet_is_rejected() {
        let queue = StreamQueue::new();
        queue.push(packet(1)).unwrap();
        queue.push(packet(3)).unwrap();
        let mut display = TerminalDisplay::new(Vec::new());

        let report = Player::new().run(3, &queue, &mut display);

        assert_eq!(report.outcome, PlayerState::Failed);
        assert!(matches!(
            report.faults[0],
            PlaybackError::OutOfOrder {
                expected: 2,
                found: 3
            }
        ));
        assert_eq!(display.into_inner(), b"<1>");
    }

    #[test]
    fn pacing_spaces_frames_out() {
        let queue = StreamQueue::new();
        for i in 1..=4 {
            queue.push(packet(i)).unwrap();
        }
        let mut display = TerminalDisplay::new(Vec::new());

        let player = Player::with_frame_interval(Duration::from_millis(20));
        let report = player.run(4, &queue, &mut display);

        assert_eq!(report.delivered, 4);
        // first frame goes out immediately, three intervals follow
        assert!(report.elapsed >= Duration::from_millis(60));
    }

    #[test]
    fn from_config_ignores_non_positive_fps() {
        let paced = Player::from_config(&PlayerConfig {
            target_fps: Some(25.0),
        });
        let interval = paced.frame_interval().unwrap();
        assert!((interval.as_secs_f64() - 0.04).abs() < 1e-6);

        for target_fps in [None, Some(0.0), Some(-3.0)] {
            let player = Player::from_config(&PlayerConfig { target_fps });
            assert_eq!(player.frame_interval(), None);
        }
    }
}
