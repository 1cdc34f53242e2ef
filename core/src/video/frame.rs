//! Fixed-size pixel arena.

use crate::core::FrameFormat;

/// One frame's worth of pixels plus the generation of the commit that last
/// filled it.
pub struct Frame {
    format: FrameFormat,
    pixels: Box<[u8]>,
    generation: u64,
}

impl Frame {
    pub(super) fn new(format: FrameFormat) -> Self {
        Self {
            format,
            pixels: vec![0; format.plane_len()].into_boxed_slice(),
            generation: 0,
        }
    }

    pub fn format(&self) -> FrameFormat {
        self.format
    }

    /// Generation of the commit that produced these pixels; 0 before the
    /// first commit.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(super) fn set_generation(&mut self, generation: u64) {
        self.generation = generation;
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}
