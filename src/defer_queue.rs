//! Deferred publish queue: the handoff from the worker (and, for log
//! lines, the producer callback) to the cooperative main loop.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Closures enqueued here must be `move`-only and must not re-enter
/// `defer` - the queue's own mutex is held only across the push/pop, not
/// across closure execution, but draining happens from a single thread
/// (the main loop) so reentrancy would simply enqueue after the current
/// drain's budget and be picked up next tick; it is disallowed by
/// contract rather than by a runtime guard.
pub struct DeferQueue {
    queue: Mutex<VecDeque<Box<dyn FnOnce() + Send>>>,
}

/// Main loop drains at most this many closures per iteration, bounding
/// per-iteration latency (host loop runs ~100 Hz; 5x100 = 500
/// publications/sec headroom).
pub const MAX_DRAIN_PER_TICK: usize = 5;

impl DeferQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a closure to the queue.
    pub fn defer(&self, f: impl FnOnce() + Send + 'static) {
        let mut queue = self.queue.lock().expect("defer queue poisoned");
        queue.push_back(Box::new(f));
    }

    /// Drains and runs up to [`MAX_DRAIN_PER_TICK`] closures, returning
    /// how many ran.
    pub fn drain_tick(&self) -> usize {
        let mut drained = Vec::with_capacity(MAX_DRAIN_PER_TICK);
        {
            let mut queue = self.queue.lock().expect("defer queue poisoned");
            for _ in 0..MAX_DRAIN_PER_TICK {
                match queue.pop_front() {
                    Some(f) => drained.push(f),
                    None => break,
                }
            }
        }
        let count = drained.len();
        for f in drained {
            f();
        }
        count
    }

    /// Number of closures currently queued, for diagnostics/tests.
    pub fn len(&self) -> usize {
        self.queue.lock().expect("defer queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for DeferQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn drains_at_most_budget_per_tick() {
        let queue = DeferQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..12 {
            let counter = Arc::clone(&counter);
            queue.defer(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }

        assert_eq!(queue.drain_tick(), MAX_DRAIN_PER_TICK);
        assert_eq!(counter.load(Ordering::SeqCst), MAX_DRAIN_PER_TICK);
        assert_eq!(queue.drain_tick(), MAX_DRAIN_PER_TICK);
        assert_eq!(queue.drain_tick(), 2);
        assert_eq!(counter.load(Ordering::SeqCst), 12);
        assert!(queue.is_empty());
    }

    #[test]
    fn fifo_order_preserved() {
        let queue = DeferQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let order = Arc::clone(&order);
            queue.defer(move || order.lock().unwrap().push(i));
        }
        queue.drain_tick();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
