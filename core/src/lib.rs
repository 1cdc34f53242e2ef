//! Real-time synchronization core between a fixed-rate emulator and
//! free-running host surfaces.
//!
//! The emulator produces exactly one video frame and one batch of audio
//! samples per emulated frame, at a fixed virtual rate. The host renders and
//! plays at its own rates. This crate owns everything in between:
//!
//! - [`EmulationPacer`] — the scheduling state machine that decides when the
//!   next virtual frame runs, absorbs drift, bounds catch-up bursts, and
//!   recovers from stalls.
//! - [`SampleRing`] — a bounded audio FIFO with drop-oldest overrun handling
//!   and latency trimming, fed once per frame and drained by the device
//!   callback.
//! - [`FrameDoubleBuffer`] / [`FrameFanout`] — tear-free video handoff to any
//!   number of consumers, each with its own pair of frame arenas.
//! - [`PadStateResolver`] / [`TurboPhaseGenerator`] — per-frame controller
//!   state, including turbo duty cycles keyed to emulated frames.
//! - [`PacerHandle`] — an optional dedicated thread that drives the pacer
//!   for hosts without a timer of their own.
//!
//! The emulator itself stays behind the [`EmulatorCore`] trait; this crate
//! never interprets pixels or samples, it only moves them on time.

pub mod audio;
pub mod core;
pub mod error;
pub mod input;
pub mod pacer;
pub mod runner;
pub mod video;

#[cfg(test)]
mod test_utils;

pub use audio::{AudioOutput, RingThresholds, SampleRing};
pub use self::core::{BYTES_PER_PIXEL, EmulatorCore, FrameFormat, FrameMeta, NUM_PORTS};
pub use error::{AudioOutputError, ConfigError, PacerError, StepError};
pub use input::{PadStateResolver, ResolvedInput, TurboPhaseGenerator};
pub use pacer::{EmulationPacer, NTSC_FPS, PacerConfig, PacerState, SpeedMode, TickReport};
pub use runner::PacerHandle;
pub use video::{
    ConsumerId, Frame, FrameDoubleBuffer, FrameFanout, FrameReadGuard, FrameSink, FrameWriteGuard,
};
