//! Bounded blocking FIFO between the loader and the player

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crossbeam::utils::CachePadded;

/// Returned by a push that could not land because the queue was closed or stopped.
/// Hands the item back to the caller.
#[derive(PartialEq, Eq)]
pub struct Closed<T>(pub T);

impl<T> fmt::Debug for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Closed(..)")
    }
}

impl<T> fmt::Display for Closed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("stream queue is closed")
    }
}

impl<T> std::error::Error for Closed<T> {}

struct State<T> {
    items: VecDeque<T>,
    /// Producer is done; consumers drain what is left
    closed: bool,
    /// Cooperative cancellation; queued items are already dropped
    stopped: bool,
}

#[derive(Default)]
struct Stats {
    pushed: AtomicU64,
    popped: AtomicU64,
    producer_waits: AtomicU64,
    peak_depth: AtomicUsize,
}

/// Snapshot of queue counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pushed: u64,
    pub popped: u64,
    pub producer_waits: u64,
    pub peak_depth: usize,
}

/// FIFO with blocking pop and watermark backpressure.
///
/// All state lives under one mutex. Consumers park on `readable`, producers
/// on `writable` and fill-level waiters on `filled`; every wait re-checks its
/// predicate on wake-up. Ordering and
/// the watermark bound are exact for a single producer only: with several
/// producers the watermark check and the push are not one step relative to
/// each other.
pub struct StreamQueue<T> {
    state: Mutex<State<T>>,
    readable: Condvar,
    writable: Condvar,
    filled: Condvar,
    stats: CachePadded<Stats>,
}

impl<T> Default for StreamQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> StreamQueue<T> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
                stopped: false,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
            filled: Condvar::new(),
            stats: CachePadded::new(Stats::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // A panicking holder cannot leave the deque half-updated
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append to the tail and wake one consumer
    pub fn push(&self, item: T) -> Result<(), Closed<T>> {
        let mut state = self.lock();
        self.push_locked(&mut state, item)
    }

    /// Block while the queue is at or above `watermark`, then push.
    ///
    /// The producer blocks once depth reaches the watermark, so a single
    /// producer never pushes past `watermark` items. A watermark of 0 is treated as 1 so the producer can always make
    /// progress. Returns the item if the queue is closed or stopped while
    /// waiting.
    pub fn wait_and_push(&self, watermark: usize, item: T) -> Result<(), Closed<T>> {
        let watermark = watermark.max(1);
        let mut state = self.lock();

        if state.items.len() >= watermark && !state.stopped && !state.closed {
            self.stats.producer_waits.fetch_add(1, Ordering::Relaxed);
            state = self
                .writable
                .wait_while(state, |s| {
                    s.items.len() >= watermark && !s.stopped && !s.closed
                })
                .unwrap_or_else(PoisonError::into_inner);
        }

        self.push_locked(&mut state, item)
    }

    fn push_locked(&self, state: &mut State<T>, item: T) -> Result<(), Closed<T>> {
        if state.stopped || state.closed {
            return Err(Closed(item));
        }
        state.items.push_back(item);

        self.stats.pushed.fetch_add(1, Ordering::Relaxed);
        self.stats
            .peak_depth
            .fetch_max(state.items.len(), Ordering::Relaxed);
        self.readable.notify_one();
        // Fill-level waiters each need a different depth
        self.filled.notify_all();
        Ok(())
    }

    /// Remove the head, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue is stopped, or closed and drained.
    pub fn pop(&self) -> Option<T> {
        let state = self.lock();
        let mut state = self
            .readable
            .wait_while(state, |s| s.items.is_empty() && !s.closed && !s.stopped)
            .unwrap_or_else(PoisonError::into_inner);

        if state.stopped {
            return None;
        }
        let item = state.items.pop_front()?;
        drop(state);

        self.stats.popped.fetch_add(1, Ordering::Relaxed);
        self.writable.notify_one();
        Some(item)
    }

    /// Block until at least `min` items are queued, or nothing more can arrive.
    /// Returns the depth observed on wake-up.
    pub fn wait_for_depth(&self, min: usize) -> usize {
        let state = self.lock();
        self.filled
            .wait_while(state, |s| s.items.len() < min && !s.closed && !s.stopped)
            .unwrap_or_else(PoisonError::into_inner)
            .items
            .len()
    }

    /// Momentary depth
    pub fn size(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Producer is finished; consumers drain the remaining items, then see `None`
    pub fn close(&self) {
        self.lock().closed = true;
        self.readable.notify_all();
        self.writable.notify_all();
        self.filled.notify_all();
    }

    /// Cancel: drop everything queued and release every waiter
    pub fn stop(&self) {
        let dropped = {
            let mut state = self.lock();
            state.stopped = true;
            std::mem::take(&mut state.items)
        };
        self.readable.notify_all();
        self.writable.notify_all();
        self.filled.notify_all();
        // Release outside the lock
        drop(dropped);
    }

    pub fn is_closed(&self) -> bool {
        let state = self.lock();
        state.closed || state.stopped
    }

    pub fn is_stopped(&self) -> bool {
        self.lock().stopped
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushed: self.stats.pushed.load(Ordering::Relaxed),
            popped: self.stats.popped.load(Ordering::Relaxed),
            producer_waits: self.stats.producer_waits.load(Ordering::Relaxed),
            peak_depth: self.stats.peak_depth.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    /// Long enough for a blocked thread to have parked
    const SETTLE: Duration = Duration::from_millis(100);

    #[test]
    fn fifo_order_single_thread() {
        let q = StreamQueue::new();
        for i in 0..5 {
            q.push(i).unwrap();
        }
        assert_eq!(q.size(), 5);
        let out: Vec<_> = (0..5).map(|_| q.pop().unwrap()).collect();
        assert_eq!(out, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn fifo_order_across_threads() {
        let q = Arc::new(StreamQueue::new());
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                for i in 0..500u32 {
                    q.wait_and_push(3, i).unwrap();
                    if i % 7 == 0 {
                        thread::yield_now();
                    }
                }
                q.close();
            })
        };

        let mut seen = Vec::new();
        while let Some(i) = q.pop() {
            seen.push(i);
        }
        producer.join().unwrap();

        assert_eq!(seen, (0..500).collect::<Vec<_>>());
        assert!(q.stats().peak_depth <= 4);
    }

    #[test]
    fn pop_blocks_until_push() {
        let q = Arc::new(StreamQueue::new());
        let (tx, rx) = flume::bounded(1);
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || tx.send(q.pop()).unwrap())
        };

        thread::sleep(SETTLE);
        assert!(rx.try_recv().is_err());

        q.push("frame").unwrap();
        assert_eq!(rx.recv().unwrap(), Some("frame"));
        consumer.join().unwrap();
    }

    #[test]
    fn wait_and_push_blocks_at_watermark() {
        let q = Arc::new(StreamQueue::new());
        q.wait_and_push(2, 1).unwrap();
        q.wait_and_push(2, 2).unwrap();
        assert_eq!(q.size(), 2);

        let (tx, rx) = flume::bounded(1);
        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                q.wait_and_push(2, 3).unwrap();
                tx.send(()).unwrap();
            })
        };

        thread::sleep(SETTLE);
        assert!(rx.try_recv().is_err(), "third push must block");
        assert_eq!(q.size(), 2);

        assert_eq!(q.pop(), Some(1));
        rx.recv().unwrap();
        producer.join().unwrap();

        assert!(q.size() <= 3);
        assert_eq!(q.stats().producer_waits, 1);
        assert_eq!(q.pop(), Some(2));
        assert_eq!(q.pop(), Some(3));
    }

    #[test]
    fn zero_watermark_still_progresses() {
        let q = StreamQueue::new();
        q.wait_and_push(0, 'a').unwrap();
        assert_eq!(q.pop(), Some('a'));
    }

    #[test]
    fn close_drains_then_ends() {
        let q = StreamQueue::new();
        q.push(1).unwrap();
        q.close();

        assert_eq!(q.push(2), Err(Closed(2)));
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn stop_releases_blocked_producer_and_items() {
        let q = Arc::new(StreamQueue::new());
        let item = Arc::new(());
        q.push(Arc::clone(&item)).unwrap();

        let producer = {
            let q = Arc::clone(&q);
            let item = Arc::clone(&item);
            thread::spawn(move || q.wait_and_push(1, item).is_err())
        };
        thread::sleep(SETTLE);

        q.stop();
        assert!(producer.join().unwrap());
        assert_eq!(Arc::strong_count(&item), 1, "every queued item is released");
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn stop_releases_blocked_consumer() {
        let q: Arc<StreamQueue<u8>> = Arc::new(StreamQueue::new());
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.pop())
        };
        thread::sleep(SETTLE);

        q.stop();
        assert_eq!(consumer.join().unwrap(), None);
        assert!(q.is_stopped());
    }

    #[test]
    fn wait_for_depth_wakes_on_fill_or_close() {
        let q = Arc::new(StreamQueue::new());
        let waiter = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.wait_for_depth(3))
        };
        q.push(1).unwrap();
        q.push(2).unwrap();
        q.push(3).unwrap();
        assert!(waiter.join().unwrap() >= 3);

        let q2: StreamQueue<u8> = StreamQueue::new();
        q2.close();
        assert_eq!(q2.wait_for_depth(10), 0);
    }

    #[test]
    fn pending_fill_wait_does_not_starve_pop() {
        let q = Arc::new(StreamQueue::new());
        let waiter = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.wait_for_depth(10))
        };
        thread::sleep(SETTLE);

        let (tx, rx) = flume::bounded(1);
        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || tx.send(q.pop()).unwrap())
        };
        thread::sleep(SETTLE);

        q.push(7).unwrap();
        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok(Some(7)));
        consumer.join().unwrap();

        // fill level never reached; close releases the waiter
        q.close();
        assert_eq!(waiter.join().unwrap(), 0);
    }

    #[test]
    fn several_fill_waiters_wake_at_their_own_depth() {
        let q = Arc::new(StreamQueue::new());
        let waiters: Vec<_> = [1, 2]
            .into_iter()
            .map(|min| {
                let q = Arc::clone(&q);
                (min, thread::spawn(move || q.wait_for_depth(min)))
            })
            .collect();
        thread::sleep(SETTLE);

        q.push('a').unwrap();
        q.push('b').unwrap();
        for (min, waiter) in waiters {
            assert!(waiter.join().unwrap() >= min);
        }
    }
}
