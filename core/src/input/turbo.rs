//! Turbo button duty cycle.

use crate::error::ConfigError;

/// Default duty cycle: 2 frames on, 2 frames off (15 Hz at 60 fps).
pub const DEFAULT_ON_FRAMES: u32 = 2;
pub const DEFAULT_OFF_FRAMES: u32 = 2;

/// Square-wave phase generator clocked by emulated frames.
///
/// With `on_frames = 2, off_frames = 3` the phase observed after each
/// `advance()` is on, on, off, off, off, repeating. `reset()` puts the
/// generator back at the start of a full on phase, which is what makes a
/// fresh turbo press fire immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurboPhaseGenerator {
    on_frames: u32,
    off_frames: u32,
    phase_on: bool,
    /// Frames left in the current phase, consumed by `advance()`.
    remaining: u32,
}

impl TurboPhaseGenerator {
    /// # Errors
    ///
    /// Rejects zero frame counts; a phase must last at least one frame.
    pub fn new(on_frames: u32, off_frames: u32) -> Result<Self, ConfigError> {
        if on_frames == 0 || off_frames == 0 {
            return Err(ConfigError::ZeroTurboFrames {
                on_frames,
                off_frames,
            });
        }
        Ok(Self {
            on_frames,
            off_frames,
            phase_on: true,
            remaining: on_frames,
        })
    }

    pub fn on_frames(&self) -> u32 {
        self.on_frames
    }

    pub fn off_frames(&self) -> u32 {
        self.off_frames
    }

    /// Change the duty cycle. The current phase finishes with its old
    /// length; the new counts apply from the next phase flip.
    pub fn set_timing(&mut self, on_frames: u32, off_frames: u32) {
        self.on_frames = on_frames.max(1);
        self.off_frames = off_frames.max(1);
    }

    /// Restart at the beginning of a full on phase.
    pub fn reset(&mut self) {
        self.phase_on = true;
        self.remaining = self.on_frames;
    }

    /// Consume one emulated frame of the current phase, flipping and
    /// reloading when it runs out. Call at most once per emitted frame, and
    /// only while turbo is held.
    pub fn advance(&mut self) {
        if self.remaining == 0 {
            self.phase_on = !self.phase_on;
            self.remaining = if self.phase_on {
                self.on_frames
            } else {
                self.off_frames
            };
        }
        self.remaining -= 1;
    }

    /// Whether turbo-assigned buttons count as pressed this frame.
    pub fn is_on(&self) -> bool {
        self.phase_on
    }
}

impl Default for TurboPhaseGenerator {
    fn default() -> Self {
        Self {
            on_frames: DEFAULT_ON_FRAMES,
            off_frames: DEFAULT_OFF_FRAMES,
            phase_on: true,
            remaining: DEFAULT_ON_FRAMES,
        }
    }
}
