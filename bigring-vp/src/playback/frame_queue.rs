//! Bounded frame queue between the decode worker and the playback controller
//!
//! A blocking FIFO with fixed capacity:
//! - `put` blocks the producer while the queue is full (backpressure)
//! - `take` blocks the consumer while the queue is empty
//! - `drain` discards everything and wakes all blocked callers with
//!   [`QueueError::Drained`]
//!
//! Every drain starts a new *epoch*. The decode worker tags each frame with the
//! epoch its request was issued in and uses [`FrameQueue::put_in_epoch`], so a
//! frame decoded before a seek can never be queued after it.

use crate::playback::types::Frame;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{debug, trace};

/// Default queue capacity (frames)
pub const DEFAULT_CAPACITY: usize = 100;

/// Default low watermark (frames)
pub const DEFAULT_LOW_WATERMARK: usize = 50;

/// Queue control-flow signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QueueError {
    /// The queue was drained while waiting, or the frame belongs to an earlier epoch
    #[error("frame queue drained")]
    Drained,
}

/// Frame counters since the queue was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub frames_put: u64,
    pub frames_taken: u64,
    pub frames_drained: u64,
    pub drains: u64,
}

struct Inner {
    frames: VecDeque<Frame>,
    epoch: u64,
    /// Set by `drain`, cleared by the next successful put
    drained: bool,
    stats: QueueStats,
}

/// Bounded blocking FIFO of decoded frames
pub struct FrameQueue {
    inner: Mutex<Inner>,
    not_full: Condvar,
    not_empty: Condvar,
    capacity: usize,
    low_watermark: usize,
}

impl FrameQueue {
    /// Create a queue holding at most `capacity` frames
    ///
    /// `low_watermark` is clamped below `capacity`.
    pub fn new(capacity: usize, low_watermark: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                frames: VecDeque::with_capacity(capacity),
                epoch: 0,
                drained: false,
                stats: QueueStats::default(),
            }),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
            capacity,
            low_watermark: low_watermark.min(capacity - 1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a frame, blocking while the queue is full
    ///
    /// Fails with `Drained` if the queue is drained while waiting; the frame
    /// is dropped in that case.
    pub fn put(&self, frame: Frame) -> Result<(), QueueError> {
        let epoch = self.lock().epoch;
        self.put_in_epoch(epoch, frame)
    }

    /// Append a frame decoded for `epoch`
    ///
    /// Frames from an earlier epoch are rejected immediately.
    pub fn put_in_epoch(&self, epoch: u64, frame: Frame) -> Result<(), QueueError> {
        let mut inner = self.lock();
        loop {
            if inner.epoch != epoch {
                trace!(
                    "Rejecting frame {} from epoch {} (current {})",
                    frame.frame_number,
                    epoch,
                    inner.epoch
                );
                return Err(QueueError::Drained);
            }
            if inner.frames.len() < self.capacity {
                break;
            }
            inner = self
                .not_full
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }

        inner.frames.push_back(frame);
        inner.drained = false;
        inner.stats.frames_put += 1;
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Remove the oldest frame, blocking while the queue is empty
    ///
    /// Fails with `Drained` when the queue has been drained and nothing was
    /// put since, or when a drain happens while waiting.
    pub fn take(&self) -> Result<Frame, QueueError> {
        let mut inner = self.lock();
        let epoch = inner.epoch;
        loop {
            if inner.epoch != epoch {
                return Err(QueueError::Drained);
            }
            if let Some(frame) = inner.frames.pop_front() {
                inner.stats.frames_taken += 1;
                drop(inner);
                self.not_full.notify_one();
                return Ok(frame);
            }
            if inner.drained {
                return Err(QueueError::Drained);
            }
            inner = self
                .not_empty
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Non-blocking take
    ///
    /// `Ok(None)` means the queue is empty but live; `Err(Drained)` means it
    /// was drained and nothing has been put since.
    pub fn try_take(&self) -> Result<Option<Frame>, QueueError> {
        let mut inner = self.lock();
        match inner.frames.pop_front() {
            Some(frame) => {
                inner.stats.frames_taken += 1;
                drop(inner);
                self.not_full.notify_one();
                Ok(Some(frame))
            }
            None if inner.drained => Err(QueueError::Drained),
            None => Ok(None),
        }
    }

    /// Discard all queued frames and start a new epoch
    ///
    /// Every blocked `put` and `take` returns `Drained`. Returns the number of
    /// frames discarded.
    pub fn drain(&self) -> usize {
        let mut inner = self.lock();
        let discarded = inner.frames.len();
        inner.frames.clear();
        inner.epoch += 1;
        inner.drained = true;
        inner.stats.frames_drained += discarded as u64;
        inner.stats.drains += 1;
        let epoch = inner.epoch;
        drop(inner);

        self.not_full.notify_all();
        self.not_empty.notify_all();
        debug!("Frame queue drained: {} frames discarded, epoch {}", discarded, epoch);
        discarded
    }

    /// Current epoch (number of drains so far)
    pub fn epoch(&self) -> u64 {
        self.lock().epoch
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().frames.is_empty()
    }

    /// True when fewer than `low_watermark` frames are queued
    pub fn is_low_watermark(&self) -> bool {
        self.len() < self.low_watermark
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn low_watermark(&self) -> usize {
        self.low_watermark
    }

    pub fn stats(&self) -> QueueStats {
        self.lock().stats
    }
}

impl Default for FrameQueue {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_LOW_WATERMARK)
    }
}
