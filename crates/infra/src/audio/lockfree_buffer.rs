//! Lock-free frame FIFO between a producer thread and the audio callback
//!
//! Built on crossbeam's bounded `ArrayQueue`:
//! - Lock-free push and pop (no mutex contention)
//! - Fixed capacity, allocated once
//! - Underruns are filled with silence and counted

use crossbeam::queue::ArrayQueue;
use crossbeam::utils::CachePadded;
use soundstage_core::Frame;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Bounded multi-producer multi-consumer queue of stereo frames
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct FrameFifo {
    queue: Arc<ArrayQueue<Frame>>,

    /// Underrun counter (cache-padded to prevent false sharing)
    underruns: Arc<CachePadded<AtomicUsize>>,
}

impl FrameFifo {
    /// Create a FIFO holding at most `capacity` frames (minimum 1)
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: Arc::new(ArrayQueue::new(capacity.max(1))),
            underruns: Arc::new(CachePadded::new(AtomicUsize::new(0))),
        }
    }

    /// Push as many frames as fit; returns how many were accepted
    pub fn push_frames(&self, frames: &[Frame]) -> usize {
        let mut pushed = 0;
        for &frame in frames {
            if self.queue.push(frame).is_err() {
                break;
            }
            pushed += 1;
        }
        pushed
    }

    /// Fill `out` from the queue, padding with silence on underrun
    ///
    /// Returns the number of frames that came from the queue.
    pub fn pop_into(&self, out: &mut [Frame]) -> usize {
        let mut popped = 0;
        for slot in out.iter_mut() {
            match self.queue.pop() {
                Some(frame) => {
                    *slot = frame;
                    popped += 1;
                }
                None => *slot = Frame::SILENCE,
            }
        }

        if popped < out.len() {
            let count = self.underruns.fetch_add(1, Ordering::Relaxed) + 1;
            if count.is_power_of_two() {
                warn!(
                    "FIFO underrun: {} of {} frames missing ({} underruns so far)",
                    out.len() - popped,
                    out.len(),
                    count
                );
            }
        }
        popped
    }

    /// Number of underruns since creation or the last `clear`
    pub fn underruns(&self) -> usize {
        self.underruns.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Free slots for the producer
    pub fn available_write(&self) -> usize {
        self.capacity() - self.len()
    }

    /// Drop queued frames and reset the underrun counter
    pub fn clear(&self) {
        while self.queue.pop().is_some() {}
        self.underruns.store(0, Ordering::Relaxed);
    }
}

impl std::fmt::Debug for FrameFifo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameFifo")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("underruns", &self.underruns())
            .finish()
    }
}
