//! Drift-corrected emulation pacing.
//!
//! The pacer owns the schedule on which virtual frames run. It keeps an
//! absolute deadline for the next frame and, on every [`tick`], runs however
//! many frames have come due (bounded), advancing the deadline by exact
//! frame durations so rounding never accumulates. When the host falls so far
//! behind that chasing the backlog would just produce a burst, the schedule
//! is reset to "now" and emulation continues at normal cadence from there.
//!
//! The pacer never sleeps and never reads the clock itself; the caller
//! passes `now` into [`tick`]. That keeps the tick source pluggable (host
//! timer, render vsync, or the dedicated thread in [`crate::runner`]) and
//! makes the scheduling behavior testable with a synthetic clock.
//!
//! [`tick`]: EmulationPacer::tick

mod config;


pub use config::{NTSC_FPS, PacerConfig};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::audio::SampleRing;
use crate::core::{EmulatorCore, NUM_PORTS};
use crate::error::{ConfigError, PacerError};
use crate::input::PadStateResolver;
use crate::video::{ConsumerId, FrameFanout, FrameSink};

/// Pacer run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacerState {
    /// Not scheduling frames. Initial state, and where fatal errors land.
    Idle,
    /// Emitting frames forward on schedule.
    Running,
    /// Emitting frames backward through the core's history.
    Rewinding,
}

/// Speed regime currently applied to the frame schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedMode {
    Normal,
    /// Fast-forward at the given percent of base speed (100..=1000).
    FastForward(u32),
    /// Rewind at the given percent of base speed (100..=1000).
    Rewind(u32),
}

/// What one [`EmulationPacer::tick`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Virtual frames emitted (forward or backward).
    pub frames_run: u32,
    /// The backlog exceeded the stall threshold and the schedule was reset.
    pub stalled: bool,
    /// An active rewind was cancelled by live input this tick.
    pub rewind_cancelled: bool,
}

/// Scheduling state machine bridging one [`EmulatorCore`] to host time.
///
/// Audio and video attachments are optional: without a sample ring the audio
/// batches are dropped, without registered video consumers the frames go
/// nowhere, and emulation still paces correctly either way.
pub struct EmulationPacer<C: EmulatorCore> {
    core: C,
    config: PacerConfig,
    pads: PadStateResolver,
    fanout: Arc<FrameFanout>,
    audio: Option<Arc<SampleRing>>,
    state: PacerState,
    /// State to return to when a rewind ends.
    resume_state: PacerState,
    fast_forwarding: bool,
    /// Percent of base speed applied while fast-forwarding or rewinding.
    speed_percent: u32,
    /// Absolute deadline of the next scheduled frame. `None` forces
    /// re-anchoring to the current time on the next tick.
    next_deadline: Option<Instant>,
    /// Total frames emitted since creation.
    frame_seq: u64,
}

impl<C: EmulatorCore> EmulationPacer<C> {
    /// # Errors
    ///
    /// Rejects a non-positive base frame rate or a zero catch-up bound.
    pub fn new(core: C, config: PacerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            core,
            config,
            pads: PadStateResolver::new(),
            fanout: Arc::new(FrameFanout::new()),
            audio: None,
            state: PacerState::Idle,
            resume_state: PacerState::Idle,
            fast_forwarding: false,
            speed_percent: 200,
            next_deadline: None,
            frame_seq: 0,
        })
    }

    pub fn core(&self) -> &C {
        &self.core
    }

    pub fn core_mut(&mut self) -> &mut C {
        &mut self.core
    }

    pub fn state(&self) -> PacerState {
        self.state
    }

    pub fn config(&self) -> &PacerConfig {
        &self.config
    }

    /// Total frames emitted since creation.
    pub fn frame_seq(&self) -> u64 {
        self.frame_seq
    }

    /// Deadline of the next scheduled frame, if one is anchored.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.next_deadline
    }

    /// The fanout to register video consumers with.
    pub fn fanout(&self) -> &Arc<FrameFanout> {
        &self.fanout
    }

    /// Attach the ring that receives each frame's audio batch.
    pub fn set_audio(&mut self, ring: Arc<SampleRing>) {
        self.audio = Some(ring);
    }

    /// Register a video consumer. Convenience passthrough to the fanout.
    pub fn register_video_consumer(&self, sink: &Arc<FrameSink>) -> ConsumerId {
        self.fanout.register(sink)
    }

    pub fn unregister_video_consumer(&self, id: ConsumerId) {
        self.fanout.unregister(id)
    }

    // --- control surface -------------------------------------------------

    /// Start (or resume) scheduling frames. During a rewind this only
    /// changes where the rewind returns to.
    pub fn run(&mut self) {
        match self.state {
            PacerState::Idle => {
                self.state = PacerState::Running;
                self.next_deadline = None;
            }
            PacerState::Rewinding => self.resume_state = PacerState::Running,
            PacerState::Running => {}
        }
    }

    /// Stop scheduling frames. Takes effect before the next tick emits
    /// anything.
    pub fn pause(&mut self) {
        match self.state {
            PacerState::Running => self.state = PacerState::Idle,
            PacerState::Rewinding => self.resume_state = PacerState::Idle,
            PacerState::Idle => {}
        }
    }

    /// Enter or leave rewind. Entering remembers the current state and
    /// returns to it when the rewind ends (by release or by input).
    pub fn set_rewinding(&mut self, rewinding: bool) {
        if rewinding {
            if self.state != PacerState::Rewinding {
                self.resume_state = self.state;
                self.state = PacerState::Rewinding;
                self.next_deadline = None;
            }
        } else if self.state == PacerState::Rewinding {
            self.state = self.resume_state;
            self.next_deadline = None;
        }
    }

    pub fn set_fast_forwarding(&mut self, fast_forwarding: bool) {
        if self.fast_forwarding != fast_forwarding {
            self.fast_forwarding = fast_forwarding;
            // Speed changes re-anchor the schedule; mixing deadlines computed
            // at different speeds would warp the next few frames.
            self.next_deadline = None;
        }
    }

    /// Set the fast-forward/rewind speed, in percent of base speed.
    /// Clamped to 100..=1000.
    pub fn set_speed_percent(&mut self, percent: u32) {
        self.speed_percent = percent.clamp(100, 1000);
    }

    pub fn set_pad(&mut self, port: usize, mask: u16) {
        self.pads.set_pad(port, mask);
    }

    pub fn set_turbo_mask(&mut self, port: usize, mask: u16) {
        self.pads.set_turbo_mask(port, mask);
    }

    /// Set a port's turbo duty cycle in frames. Zero counts are clamped
    /// to 1.
    pub fn set_turbo_timing(&mut self, port: usize, on_frames: u32, off_frames: u32) {
        self.pads.set_turbo_timing(port, on_frames, off_frames);
    }

    /// Current speed regime.
    pub fn speed_mode(&self) -> SpeedMode {
        if self.state == PacerState::Rewinding {
            SpeedMode::Rewind(self.speed_percent)
        } else if self.fast_forwarding {
            SpeedMode::FastForward(self.speed_percent)
        } else {
            SpeedMode::Normal
        }
    }

    /// Duration of one virtual frame under the current speed regime.
    pub fn current_frame_duration(&self) -> Duration {
        let base = self.config.base_frame_duration();
        let percent = match self.speed_mode() {
            SpeedMode::Normal => 100,
            SpeedMode::FastForward(p) | SpeedMode::Rewind(p) => p,
        } as u128;
        let nanos = (base.as_nanos() * 100 / percent).max(1);
        Duration::from_nanos(nanos as u64)
    }

    /// Run exactly one virtual frame, regardless of state. Does not touch
    /// the deadline schedule; pairs with [`pause`](Self::pause) for
    /// frame-by-frame debugging.
    ///
    /// # Errors
    ///
    /// A step failure idles the pacer and is returned to the caller.
    pub fn step(&mut self) -> Result<(), PacerError> {
        let resolved = self.pads.resolve_frame();
        self.emit_forward_frame(&resolved.masks)?;
        Ok(())
    }

    /// Advance the schedule to `now`, emitting every frame that has come
    /// due, up to the catch-up bound.
    ///
    /// # Errors
    ///
    /// A fatal step error idles the pacer mid-tick; frames emitted before
    /// the failure stand.
    pub fn tick(&mut self, now: Instant) -> Result<TickReport, PacerError> {
        let mut report = TickReport::default();
        if self.state == PacerState::Idle {
            return Ok(report);
        }

        let frame_duration = self.current_frame_duration();
        let mut deadline = self.next_deadline.unwrap_or(now);

        while now >= deadline && report.frames_run < self.config.max_catch_up_frames {
            if self.state == PacerState::Rewinding {
                // Live input cancels the rewind; otherwise the probe result
                // is discarded, the core replays its own recorded history.
                let resolved = self.pads.resolve_frame();
                if resolved.any_input {
                    self.state = self.resume_state;
                    report.rewind_cancelled = true;
                    debug!("rewind cancelled by input");
                    if self.state == PacerState::Idle {
                        break;
                    }
                    self.emit_forward_frame(&resolved.masks)
                        .map_err(|e| self.save_deadline_and(deadline, e))?;
                } else {
                    self.emit_rewind_frame()
                        .map_err(|e| self.save_deadline_and(deadline, e))?;
                }
            } else {
                let resolved = self.pads.resolve_frame();
                self.emit_forward_frame(&resolved.masks)
                    .map_err(|e| self.save_deadline_and(deadline, e))?;
            }
            report.frames_run += 1;
            deadline += frame_duration;
        }

        if now > deadline && now - deadline > self.config.stall_threshold {
            debug!(behind = ?(now - deadline), "stall detected, schedule reset to now");
            deadline = now;
            report.stalled = true;
        }
        self.next_deadline = Some(deadline);
        Ok(report)
    }

    fn save_deadline_and(&mut self, deadline: Instant, err: PacerError) -> PacerError {
        self.next_deadline = Some(deadline);
        err
    }

    fn emit_forward_frame(&mut self, masks: &[u16; NUM_PORTS]) -> Result<(), PacerError> {
        if let Err(e) = self.core.step_frame(masks) {
            self.state = PacerState::Idle;
            warn!(error = %e, "emulator step failed, pacer idled");
            return Err(e.into());
        }
        self.publish_frame();
        Ok(())
    }

    fn emit_rewind_frame(&mut self) -> Result<(), PacerError> {
        match self.core.step_back() {
            Ok(true) => {
                // Queued forward-audio no longer matches the restored frame.
                if let Some(ring) = &self.audio {
                    ring.clear();
                }
                self.fanout.publish(&self.core);
                self.frame_seq += 1;
                Ok(())
            }
            // History exhausted: hold the current frame, keep rewinding state
            // so releasing the button resumes cleanly.
            Ok(false) => Ok(()),
            Err(e) => {
                self.state = PacerState::Idle;
                warn!(error = %e, "rewind step failed, pacer idled");
                Err(e.into())
            }
        }
    }

    fn publish_frame(&mut self) {
        if let Some(ring) = &self.audio {
            let samples = self.core.audio_samples();
            if !samples.is_empty() {
                ring.push(samples);
            }
        }
        self.fanout.publish(&self.core);
        self.frame_seq += 1;
    }
}
