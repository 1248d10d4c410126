//! Bounded queues of interleaved audio samples.
//!
//! [`AudioQueue`] is the hand-off between pipeline stages:
//! - decode thread → queue
//! - resampler thread → queue
//! - CPAL callback drains the queue (non-blocking)
//!
//! Producers block when the queue is full, which is what bounds memory and
//! latency. `close()` makes shutdown deterministic: blocked producers return,
//! and consumers drain whatever is left before seeing the end.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Thread-safe bounded queue of interleaved `f32` samples.
///
/// Samples are stored interleaved (`frame0[ch0], frame0[ch1], frame1[ch0], …`)
/// and the channel count is fixed for the lifetime of the queue.
pub struct AudioQueue {
    channels: usize,
    capacity_samples: usize,
    inner: Mutex<Inner>,
    cv: Condvar,
}

struct Inner {
    samples: VecDeque<f32>,
    closed: bool,
}

/// How a consumer wants frames popped.
pub enum Pop {
    /// Block until exactly `frames` are available; `None` if the queue closes
    /// before enough data arrives.
    Exact { frames: usize },
    /// Block until at least one frame is available, then return up to
    /// `max_frames`; `None` once closed and empty.
    UpTo { max_frames: usize },
    /// Return immediately with up to `max_frames`, or `None` if empty.
    Immediate { max_frames: usize },
}

/// Queue capacity in samples for a `(rate, channels, seconds)` buffering target.
///
/// Non-finite or non-positive `seconds` falls back to a safe default.
pub fn capacity_for(rate_hz: u32, channels: usize, seconds: f32) -> usize {
    let seconds = if seconds.is_finite() && seconds > 0.0 {
        seconds
    } else {
        2.0
    };
    let frames = (rate_hz as f32 * seconds).ceil() as usize;
    frames.saturating_mul(channels)
}

impl AudioQueue {
    pub fn new(channels: usize, capacity_samples: usize) -> Self {
        Self {
            channels,
            capacity_samples,
            inner: Mutex::new(Inner {
                samples: VecDeque::new(),
                closed: false,
            }),
            cv: Condvar::new(),
        }
    }

    /// Channel count of the interleaved stream carried by this queue.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        self.capacity_samples / self.channels
    }

    /// Whether the producer has closed the queue.
    ///
    /// A closed queue may still hold samples until drained.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    /// Whether the queue is closed and fully drained.
    ///
    /// This is the end-of-stream signal consumers poll for.
    pub fn is_drained(&self) -> bool {
        let g = self.inner.lock().unwrap();
        g.closed && g.samples.is_empty()
    }

    /// Mark the queue finished and wake all waiters. Idempotent.
    ///
    /// Blocked pushes return early (dropping their remaining samples) and
    /// blocking pops stop waiting once the buffered data runs out.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        drop(g);
        self.cv.notify_all();
    }

    /// Push interleaved samples, blocking while the queue is full.
    ///
    /// Returns early (samples dropped) if the queue is closed while waiting.
    pub fn push_blocking(&self, samples: &[f32]) {
        let mut offset = 0;

        while offset < samples.len() {
            let mut g = self.inner.lock().unwrap();
            while g.samples.len() >= self.capacity_samples && !g.closed {
                g = self.cv.wait(g).unwrap();
            }
            if g.closed {
                return;
            }

            while offset < samples.len() && g.samples.len() < self.capacity_samples {
                g.samples.push_back(samples[offset]);
                offset += 1;
            }

            drop(g);
            self.cv.notify_all();
        }
    }

    /// Pop interleaved frames according to `strategy`.
    ///
    /// Returns `None` when the queue cannot satisfy the request anymore (see
    /// each [`Pop`] variant).
    pub fn pop(&self, strategy: Pop) -> Option<Vec<f32>> {
        let mut g = self.inner.lock().unwrap();

        let take_samples = match strategy {
            Pop::Exact { frames } => {
                let want = frames * self.channels;
                while g.samples.len() < want && !g.closed {
                    g = self.cv.wait(g).unwrap();
                }
                if g.samples.len() < want {
                    return None;
                }
                want
            }
            Pop::UpTo { max_frames } => {
                while g.samples.is_empty() && !g.closed {
                    g = self.cv.wait(g).unwrap();
                }
                if g.samples.is_empty() {
                    return None;
                }
                let frames = (g.samples.len() / self.channels).min(max_frames);
                frames * self.channels
            }
            Pop::Immediate { max_frames } => {
                let frames = (g.samples.len() / self.channels).min(max_frames);
                if frames == 0 {
                    return None;
                }
                frames * self.channels
            }
        };

        let mut out = Vec::with_capacity(take_samples);
        for _ in 0..take_samples {
            out.push(g.samples.pop_front().unwrap_or(0.0));
        }

        drop(g);
        self.cv.notify_all();
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn capacity_for_falls_back_on_bad_seconds() {
        assert_eq!(capacity_for(48_000, 2, 2.0), 192_000);
        assert_eq!(capacity_for(48_000, 2, -1.0), 192_000);
        assert_eq!(capacity_for(48_000, 2, f32::NAN), 192_000);
    }

    #[test]
    fn immediate_pop_on_empty_returns_none() {
        let q = AudioQueue::new(2, 16);
        assert!(q.pop(Pop::Immediate { max_frames: 4 }).is_none());
    }

    #[test]
    fn immediate_pop_returns_whole_frames() {
        let q = AudioQueue::new(2, 64);
        assert_eq!(q.capacity_frames(), 32);
        q.push_blocking(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let out = q.pop(Pop::Immediate { max_frames: 2 }).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn exact_pop_waits_for_enough_frames() {
        let q = Arc::new(AudioQueue::new(2, 64));
        let producer = q.clone();

        let consumer = thread::spawn(move || {
            let out = q.pop(Pop::Exact { frames: 3 }).unwrap();
            assert_eq!(out.len(), 6);
        });

        producer.push_blocking(&[0.1, 0.2, 0.3, 0.4]);
        producer.push_blocking(&[0.5, 0.6]);
        consumer.join().unwrap();
    }

    #[test]
    fn exact_pop_returns_none_when_closed_short() {
        let q = AudioQueue::new(2, 64);
        q.push_blocking(&[1.0, 2.0]);
        q.close();
        assert!(q.pop(Pop::Exact { frames: 2 }).is_none());
    }

    #[test]
    fn up_to_pop_drains_tail_then_ends() {
        let q = Arc::new(AudioQueue::new(2, 64));
        let producer = q.clone();

        let consumer = thread::spawn(move || {
            let out = q.pop(Pop::UpTo { max_frames: 8 }).unwrap();
            assert_eq!(out.len(), 4);
            assert!(q.pop(Pop::UpTo { max_frames: 8 }).is_none());
        });

        producer.push_blocking(&[1.0, 2.0, 3.0, 4.0]);
        producer.close();
        consumer.join().unwrap();
    }

    #[test]
    fn close_unblocks_full_push() {
        let q = Arc::new(AudioQueue::new(1, 2));
        q.push_blocking(&[1.0, 2.0]);

        let producer = q.clone();
        let blocked = thread::spawn(move || {
            // Queue is full; this blocks until close() below.
            producer.push_blocking(&[3.0, 4.0]);
        });

        q.close();
        blocked.join().unwrap();
        assert!(q.is_closed());
    }

    #[test]
    fn drained_only_when_closed_and_empty() {
        let q = AudioQueue::new(1, 8);
        q.push_blocking(&[1.0]);
        assert!(!q.is_drained());
        q.close();
        assert!(!q.is_drained());
        q.pop(Pop::Immediate { max_frames: 1 }).unwrap();
        assert!(q.is_drained());
    }
}
