//! The emulator-facing seam.
//!
//! Everything behind [`EmulatorCore`] is out of scope for this crate: CPU,
//! PPU, APU, save states, rewind history. The pacer only needs to step it,
//! copy its finished frame, and borrow its latest audio batch.

use crate::error::{ConfigError, StepError};

/// Number of virtual controller ports.
pub const NUM_PORTS: usize = 4;

/// Bytes per pixel in committed frames (packed 32-bit color).
pub const BYTES_PER_PIXEL: usize = 4;

/// Fixed pixel layout of the frames an [`EmulatorCore`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameFormat {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Bytes per row, at least `width * 4`.
    pub stride: usize,
}

impl FrameFormat {
    /// Tightly packed format with `stride == width * 4`.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stride: width as usize * BYTES_PER_PIXEL,
        }
    }

    /// Format with an explicit row stride (for padded producer planes).
    pub fn with_stride(width: u32, height: u32, stride: usize) -> Self {
        Self {
            width,
            height,
            stride,
        }
    }

    /// Minimum legal stride for this width.
    pub fn min_stride(&self) -> usize {
        self.width as usize * BYTES_PER_PIXEL
    }

    /// Total bytes of one frame plane.
    pub fn plane_len(&self) -> usize {
        self.stride * self.height as usize
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::ZeroFrameDimensions {
                width: self.width,
                height: self.height,
            });
        }
        if self.stride < self.min_stride() {
            return Err(ConfigError::StrideTooSmall {
                stride: self.stride,
                min: self.min_stride(),
            });
        }
        Ok(())
    }
}

/// Metadata describing one committed frame, delivered to consumers instead
/// of pixel bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    /// Which of the consumer's two slots now holds the frame.
    pub slot: usize,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    /// Monotonically increasing commit counter for that consumer's buffer.
    pub generation: u64,
}

/// The frame-oriented emulator driven by the pacer.
///
/// One call to [`step_frame`](Self::step_frame) advances emulation by exactly
/// one virtual frame, after which [`copy_frame`](Self::copy_frame) and
/// [`audio_samples`](Self::audio_samples) describe that frame's output until
/// the next step.
pub trait EmulatorCore {
    /// Pixel layout of the frames this core produces. Fixed for the lifetime
    /// of the core.
    fn frame_format(&self) -> FrameFormat;

    /// Run one virtual frame with the given effective pad masks.
    ///
    /// # Errors
    ///
    /// A returned [`StepError`] is fatal to the session: the pacer stops
    /// scheduling and the host must decide how to recover.
    fn step_frame(&mut self, pads: &[u16; NUM_PORTS]) -> Result<(), StepError>;

    /// Restore the previous frame from the core's own history.
    ///
    /// Returns `Ok(false)` when no history remains; the pacer then holds the
    /// current frame rather than treating exhaustion as an error.
    ///
    /// # Errors
    ///
    /// A restore that corrupts state is as fatal as a failed forward step.
    fn step_back(&mut self) -> Result<bool, StepError>;

    /// Copy the most recently produced frame into `dst`, row by row, using
    /// `dst_stride` bytes per destination row.
    fn copy_frame(&self, dst: &mut [u8], dst_stride: usize);

    /// Interleaved stereo samples produced by the last step.
    ///
    /// The slice is only valid until the next call to
    /// [`step_frame`](Self::step_frame) or [`step_back`](Self::step_back).
    fn audio_samples(&self) -> &[f32];
}
