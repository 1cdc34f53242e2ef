//! Bounded circular buffer for interleaved stereo samples.
//!
//! The producer pushes one batch per emulated frame; the device callback
//! pulls whatever the hardware asks for. Neither side ever blocks the other
//! beyond a short cursor-update critical section. Overruns drop the oldest
//! samples, sustained fast-forward bursts are trimmed back down to the
//! target latency, and underruns are padded with silence.

use std::sync::{Mutex, PoisonError};

use tracing::{debug, trace};

use crate::error::ConfigError;

/// Interleaved channel count. Everything in the ring is stereo.
pub const CHANNELS: usize = 2;

/// Latency thresholds in samples (not stereo frames).
///
/// `min` is the floor a trim will never cut below, `target` is where a trim
/// converges to, and crossing `max` is what triggers a trim in the first
/// place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingThresholds {
    pub min: usize,
    pub target: usize,
    pub max: usize,
}

#[derive(Debug)]
struct RingState {
    buf: Box<[f32]>,
    read: usize,
    write: usize,
    available: usize,
}

/// Bounded stereo sample FIFO shared between the pacer and the device
/// callback.
#[derive(Debug)]
pub struct SampleRing {
    state: Mutex<RingState>,
    capacity: usize,
    thresholds: RingThresholds,
}

impl SampleRing {
    /// Create a ring holding up to `capacity` samples.
    ///
    /// # Errors
    ///
    /// Rejects a zero capacity and any threshold set that does not satisfy
    /// `0 < min < target < max <= capacity`.
    pub fn new(capacity: usize, thresholds: RingThresholds) -> Result<Self, ConfigError> {
        if capacity == 0 {
            return Err(ConfigError::ZeroRingCapacity);
        }
        let RingThresholds { min, target, max } = thresholds;
        if min == 0 || min >= target || target >= max || max > capacity {
            return Err(ConfigError::BadRingThresholds {
                min,
                target,
                max,
                capacity,
            });
        }
        Ok(Self {
            state: Mutex::new(RingState {
                buf: vec![0.0; capacity].into_boxed_slice(),
                read: 0,
                write: 0,
                available: 0,
            }),
            capacity,
            thresholds,
        })
    }

    /// Ring sized for the host device: about one second of stereo audio at
    /// `sample_rate` Hz, with latency thresholds near 60 / 120 / 250 ms.
    pub fn for_device_rate(sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as usize;
        // Capacity floor keeps the derived thresholds strictly ordered even
        // for absurdly low rates.
        let capacity = (rate * CHANNELS).max(8);
        let per_ms = capacity / 1000;
        let thresholds = RingThresholds {
            min: (per_ms * 60).max(CHANNELS),
            target: (per_ms * 120).max(CHANNELS * 2),
            max: (per_ms * 250).max(CHANNELS * 3).min(capacity),
        };
        Self {
            state: Mutex::new(RingState {
                buf: vec![0.0; capacity].into_boxed_slice(),
                read: 0,
                write: 0,
                available: 0,
            }),
            capacity,
            thresholds,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn thresholds(&self) -> RingThresholds {
        self.thresholds
    }

    /// Samples currently buffered.
    pub fn available_samples(&self) -> usize {
        self.lock().available
    }

    /// Stereo frames currently buffered.
    pub fn available_frames(&self) -> usize {
        self.available_samples() / CHANNELS
    }

    /// Append a batch of interleaved samples.
    ///
    /// If the batch does not fit, the oldest buffered samples are dropped to
    /// make room. If the buffered amount then still exceeds the `max`
    /// threshold, the read cursor is advanced until exactly `target` samples
    /// remain, bringing playback latency back down after a producer burst.
    pub fn push(&self, samples: &[f32]) {
        if samples.is_empty() {
            return;
        }
        // A batch larger than the whole ring reduces to its newest tail.
        let samples = if samples.len() > self.capacity {
            &samples[samples.len() - self.capacity..]
        } else {
            samples
        };

        let mut s = self.lock();
        let mut write = s.write;
        for &sample in samples {
            s.buf[write] = sample;
            write += 1;
            if write == self.capacity {
                write = 0;
            }
        }
        s.write = write;

        let pushed = samples.len();
        if s.available + pushed > self.capacity {
            let dropped = s.available + pushed - self.capacity;
            s.read = (s.read + dropped) % self.capacity;
            s.available = self.capacity;
            trace!(dropped, "sample ring overrun, dropped oldest samples");
        } else {
            s.available += pushed;
        }

        if s.available > self.thresholds.max {
            let trimmed = s.available - self.thresholds.target;
            s.read = (s.read + trimmed) % self.capacity;
            s.available = self.thresholds.target;
            debug!(
                trimmed,
                available = s.available,
                "buffered audio latency trimmed to target"
            );
        }
    }

    /// Fill `out` from the ring, padding with silence if fewer samples are
    /// buffered than requested. Returns the number of real samples written.
    pub fn pull(&self, out: &mut [f32]) -> usize {
        if out.is_empty() {
            return 0;
        }
        let mut s = self.lock();
        let n = out.len().min(s.available);
        let mut read = s.read;
        for slot in &mut out[..n] {
            *slot = s.buf[read];
            read += 1;
            if read == self.capacity {
                read = 0;
            }
        }
        s.read = read;
        s.available -= n;
        drop(s);

        if n < out.len() {
            out[n..].fill(0.0);
            trace!(missing = out.len() - n, "sample ring underrun, padded silence");
        }
        n
    }

    /// Discard everything buffered. Used when rewind restores a frame and
    /// the queued forward-audio no longer matches what is on screen.
    pub fn clear(&self) {
        let mut s = self.lock();
        s.read = 0;
        s.write = 0;
        s.available = 0;
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RingState> {
        // A panic mid-push can at worst leave a garbled batch; cursor state
        // stays internally consistent, so a poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
