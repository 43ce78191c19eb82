//! Bounded SPSC byte queue between the microphone callback (producer)
//! and the worker (consumer). Hand-rolled on `Mutex` + `Condvar` rather
//! than a lock-free queue: the contract requires a *blocking-with-timeout*
//! read and a non-blocking, silently-truncating write, which a wait-free
//! SPSC primitive (the kind used elsewhere in this codebase for sample
//! handoff) has no API for.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

struct Inner {
    buf: VecDeque<u8>,
    capacity: usize,
}

pub struct RingBuffer {
    inner: Mutex<Inner>,
    not_empty: Condvar,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::with_capacity(capacity),
                capacity,
            }),
            not_empty: Condvar::new(),
        }
    }

    /// Writes as many bytes as fit, silently truncating on overflow.
    /// Returns the number of bytes actually written. Never blocks.
    pub fn write(&self, bytes: &[u8]) -> usize {
        let mut inner = self.inner.lock().expect("ring buffer poisoned");
        let free = inner.capacity - inner.buf.len();
        let take = bytes.len().min(free);
        inner.buf.extend(bytes[..take].iter().copied());
        drop(inner);
        if take > 0 {
            self.not_empty.notify_one();
        }
        take
    }

    /// Waits up to `timeout` for at least one byte to be available, then
    /// copies up to `n` bytes (and no more than `dst.len()`) into `dst`.
    /// Returns the number of bytes read; 0 on timeout.
    pub fn read(&self, dst: &mut [u8], n: usize, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock().expect("ring buffer poisoned");
        while inner.buf.is_empty() {
            let now = Instant::now();
            if now >= deadline {
                return 0;
            }
            let (guard, result) = self
                .not_empty
                .wait_timeout(inner, deadline - now)
                .expect("ring buffer poisoned");
            inner = guard;
            if result.timed_out() && inner.buf.is_empty() {
                return 0;
            }
        }

        let take = n.min(dst.len()).min(inner.buf.len());
        for slot in dst.iter_mut().take(take) {
            *slot = inner.buf.pop_front().expect("checked len above");
        }
        take
    }

    pub fn available(&self) -> usize {
        self.inner.lock().expect("ring buffer poisoned").buf.len()
    }

    pub fn free(&self) -> usize {
        let inner = self.inner.lock().expect("ring buffer poisoned");
        inner.capacity - inner.buf.len()
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("ring buffer poisoned").capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let rb = RingBuffer::new(16);
        assert_eq!(rb.write(&[1, 2, 3, 4]), 4);
        let mut dst = [0u8; 4];
        let n = rb.read(&mut dst, 4, Duration::from_millis(10));
        assert_eq!(n, 4);
        assert_eq!(dst, [1, 2, 3, 4]);
    }

    #[test]
    fn overflow_truncates_and_retains_oldest() {
        let rb = RingBuffer::new(4);
        let written_first = rb.write(&[1, 2, 3, 4]);
        let written_second = rb.write(&[5, 6, 7, 8]);
        assert_eq!(written_first, 4);
        assert_eq!(written_second, 0);
        assert_eq!(rb.available(), 4);

        let mut dst = [0u8; 4];
        rb.read(&mut dst, 4, Duration::from_millis(10));
        assert_eq!(dst, [1, 2, 3, 4]);
    }

    #[test]
    fn read_times_out_when_empty() {
        let rb = RingBuffer::new(4);
        let mut dst = [0u8; 4];
        let n = rb.read(&mut dst, 4, Duration::from_millis(20));
        assert_eq!(n, 0);
    }

    #[test]
    fn available_and_free_are_complementary() {
        let rb = RingBuffer::new(10);
        rb.write(&[0; 3]);
        assert_eq!(rb.available(), 3);
        assert_eq!(rb.free(), 7);
    }

    #[test]
    fn producer_never_drops_below_capacity_under_matched_rate() {
        let rb = RingBuffer::new(8);
        for _ in 0..100 {
            assert_eq!(rb.write(&[0; 2]), 2);
            let mut dst = [0u8; 2];
            assert_eq!(rb.read(&mut dst, 2, Duration::from_millis(10)), 2);
        }
    }
}
