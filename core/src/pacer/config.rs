//! Pacer configuration.

use std::time::Duration;

use crate::error::ConfigError;

/// NTSC console field rate, the usual base rate for 60 Hz cores.
pub const NTSC_FPS: f64 = 60.0988;

/// Timing configuration for the emulation pacer.
#[derive(Debug, Clone, Copy)]
pub struct PacerConfig {
    /// Native frame rate of the emulated machine, in Hz.
    pub base_fps: f64,
    /// Hard cap on virtual frames run by a single tick (prevents spiral of
    /// death after a scheduling gap).
    pub max_catch_up_frames: u32,
    /// Backlog age beyond which the schedule is reset to "now" instead of
    /// chased frame by frame.
    pub stall_threshold: Duration,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            base_fps: NTSC_FPS,
            max_catch_up_frames: 10,
            stall_threshold: Duration::from_millis(200),
        }
    }
}

impl PacerConfig {
    pub(super) fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_fps > 0.0) {
            return Err(ConfigError::NonPositiveBaseFps(self.base_fps));
        }
        if self.max_catch_up_frames == 0 {
            return Err(ConfigError::ZeroCatchUpBound);
        }
        Ok(())
    }

    /// Duration of one virtual frame at 100% speed.
    pub fn base_frame_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.base_fps)
    }
}
