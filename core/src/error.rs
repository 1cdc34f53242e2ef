//! Error types for the synchronization core.
//!
//! Buffer boundary conditions (audio under/overrun, missed frames) are
//! policies, not errors, and never appear here. What does appear:
//! configuration the host got wrong, fatal emulator step failures, and audio
//! device bring-up problems.

use thiserror::Error;

/// Invalid configuration rejected at a typed constructor.
///
/// Host-facing setters clamp out-of-range values instead; these variants are
/// returned only where a caller passed a value that cannot be meaningfully
/// clamped (a zero capacity, inverted thresholds).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("sample ring capacity must be nonzero")]
    ZeroRingCapacity,

    #[error(
        "sample ring thresholds must satisfy 0 < min < target < max <= capacity \
         (min={min}, target={target}, max={max}, capacity={capacity})"
    )]
    BadRingThresholds {
        min: usize,
        target: usize,
        max: usize,
        capacity: usize,
    },

    #[error("turbo frame counts must be at least 1 (on={on_frames}, off={off_frames})")]
    ZeroTurboFrames { on_frames: u32, off_frames: u32 },

    #[error("frame dimensions must be nonzero ({width}x{height})")]
    ZeroFrameDimensions { width: u32, height: u32 },

    #[error("frame stride of {stride} bytes is smaller than one row of pixels ({min} bytes)")]
    StrideTooSmall { stride: usize, min: usize },

    #[error("base frame rate must be positive (got {0})")]
    NonPositiveBaseFps(f64),

    #[error("catch-up frame bound must be at least 1")]
    ZeroCatchUpBound,
}

/// Failure reported by the emulator while stepping a frame.
///
/// Fatal to the current session: emulation state after a failed step is not
/// trusted, so the pacer drops to idle and the host must intervene.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("emulator step failed: {0}")]
pub struct StepError(pub String);

/// Errors surfaced through the pacer's control surface and tick loop.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PacerError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Step(#[from] StepError),
}

/// Audio device bring-up and stream errors.
#[derive(Debug, Error)]
pub enum AudioOutputError {
    #[error("no default audio output device available")]
    NoDevice,

    #[error("failed to query default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("unsupported device sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("failed to build audio output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start audio output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}
