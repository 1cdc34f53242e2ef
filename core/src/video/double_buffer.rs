//! Double-buffered frame handoff for a single consumer.
//!
//! Two fixed arenas indexed 0 and 1. One atomic holds the index of the slot
//! most recently committed; the writer always fills the other slot, and a
//! commit is a single release store of the new index. A reader registers the
//! slot it is copying from in a second atomic; before reusing that slot the
//! writer spin-waits until the reader is done. Reads are short bounded
//! copies, so the wait is short and the writer never sleeps on a lock.
//!
//! All unsafe in the crate lives in this file. The protocol that makes it
//! sound:
//!
//! - at most one write guard exists at a time (`writer_busy`),
//! - the write guard only ever touches the slot that is not ready,
//! - a read guard only ever touches the slot that was ready when it
//!   registered, and re-checks its registration took effect,
//! - the writer waits out any registered reader before taking its slot.

use std::cell::UnsafeCell;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::thread;

use super::frame::Frame;
use crate::core::{FrameFormat, FrameMeta};
use crate::error::ConfigError;

/// Sentinel for `reading_slot` when no read is in progress.
const NOT_READING: usize = 2;

/// Yield cadence while waiting out a reader.
const SPINS_PER_YIELD: u32 = 128;

/// Two-slot frame buffer owned by one consumer and written by the pacer.
///
/// Create with [`FrameDoubleBuffer::new`], hand the `Arc` to a
/// [`FrameSink`](super::FrameSink), and read with [`latest`](Self::latest)
/// from the consumer's thread. Supports one writer and one reader at a time.
pub struct FrameDoubleBuffer {
    slots: [UnsafeCell<Frame>; 2],
    /// Index of the most recently committed slot.
    ready_index: AtomicUsize,
    /// Slot a reader is currently copying from, or `NOT_READING`.
    reading_slot: AtomicUsize,
    /// Guards against a second concurrent write guard.
    writer_busy: AtomicBool,
    /// Bumped once per commit.
    generation: AtomicU64,
    /// Cleared by `retire()`; writes against a retired buffer are no-ops.
    alive: AtomicBool,
    format: FrameFormat,
}

// SAFETY: slot access is serialized by the ready/reading protocol described
// in the module docs; no two parties ever hold references into the same slot
// with one of them mutable.
unsafe impl Send for FrameDoubleBuffer {}
unsafe impl Sync for FrameDoubleBuffer {}

impl FrameDoubleBuffer {
    /// Allocate both arenas for `format`.
    ///
    /// # Errors
    ///
    /// Rejects zero dimensions and a stride smaller than one row.
    pub fn new(format: FrameFormat) -> Result<Arc<Self>, ConfigError> {
        format.validate()?;
        Ok(Arc::new(Self {
            slots: [
                UnsafeCell::new(Frame::new(format)),
                UnsafeCell::new(Frame::new(format)),
            ],
            ready_index: AtomicUsize::new(0),
            reading_slot: AtomicUsize::new(NOT_READING),
            writer_busy: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            alive: AtomicBool::new(true),
            format,
        }))
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Generation of the latest commit; 0 before the first.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the buffer torn down. Outstanding read guards stay valid; any
    /// write acquired after this point is refused and an in-flight commit
    /// becomes a no-op.
    pub fn retire(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Take the slot that is not currently ready for writing.
    ///
    /// Returns `None` once the buffer is retired or while another write
    /// guard is outstanding. Blocks briefly (spin with periodic yields) if a
    /// reader is still copying out of the target slot.
    pub fn acquire_writable(self: &Arc<Self>) -> Option<FrameWriteGuard> {
        if !self.alive.load(Ordering::Acquire) {
            return None;
        }
        if self.writer_busy.swap(true, Ordering::Acquire) {
            return None;
        }
        let slot = 1 - self.ready_index.load(Ordering::Acquire);
        self.wait_until_not_reading(slot);
        Some(FrameWriteGuard {
            buffer: Arc::clone(self),
            slot,
        })
    }

    /// Read guard over the latest committed frame.
    ///
    /// Registers the read so the writer will not reuse the slot mid-copy.
    /// Hold the guard only as long as the copy takes.
    pub fn latest(&self) -> FrameReadGuard<'_> {
        loop {
            let slot = self.ready_index.load(Ordering::Acquire);
            self.reading_slot.store(slot, Ordering::SeqCst);
            // A commit may have flipped the ready index between the load and
            // the registration; re-check before trusting the slot.
            if self.ready_index.load(Ordering::SeqCst) == slot {
                return FrameReadGuard { buffer: self, slot };
            }
            self.reading_slot.store(NOT_READING, Ordering::SeqCst);
        }
    }

    fn wait_until_not_reading(&self, slot: usize) {
        let mut spins = 0u32;
        while self.reading_slot.load(Ordering::SeqCst) == slot {
            std::hint::spin_loop();
            spins = spins.wrapping_add(1);
            if spins % SPINS_PER_YIELD == 0 {
                thread::yield_now();
            }
        }
    }
}

/// Exclusive access to the writable slot. Commit to publish, drop to abandon.
pub struct FrameWriteGuard {
    buffer: Arc<FrameDoubleBuffer>,
    slot: usize,
}

impl FrameWriteGuard {
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn frame_mut(&mut self) -> &mut Frame {
        // SAFETY: this guard holds `writer_busy`, `slot` is not the ready
        // slot, and `acquire_writable` waited out any reader on it.
        unsafe { &mut *self.buffer.slots[self.slot].get() }
    }

    /// Publish this slot as the latest ready frame.
    ///
    /// Returns the committed frame's metadata, or `None` when the buffer was
    /// retired while the guard was held (the pixels are discarded).
    pub fn commit(mut self) -> Option<FrameMeta> {
        if !self.buffer.alive.load(Ordering::Acquire) {
            return None;
        }
        let generation = self.buffer.generation.fetch_add(1, Ordering::AcqRel) + 1;
        self.frame_mut().set_generation(generation);
        self.buffer.ready_index.store(self.slot, Ordering::SeqCst);
        let format = self.buffer.format;
        Some(FrameMeta {
            slot: self.slot,
            width: format.width,
            height: format.height,
            stride: format.stride,
            generation,
        })
    }
}

impl Drop for FrameWriteGuard {
    fn drop(&mut self) {
        self.buffer.writer_busy.store(false, Ordering::Release);
    }
}

/// Shared access to the latest committed frame.
pub struct FrameReadGuard<'a> {
    buffer: &'a FrameDoubleBuffer,
    slot: usize,
}

impl FrameReadGuard<'_> {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Deref for FrameReadGuard<'_> {
    type Target = Frame;

    fn deref(&self) -> &Frame {
        // SAFETY: `reading_slot` registers this slot, so the writer will not
        // take it until the guard drops; commits only flip `ready_index`
        // away from it.
        unsafe { &*self.buffer.slots[self.slot].get() }
    }
}

impl Drop for FrameReadGuard<'_> {
    fn drop(&mut self) {
        self.buffer.reading_slot.store(NOT_READING, Ordering::SeqCst);
    }
}
