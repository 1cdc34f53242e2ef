//! Dedicated tick thread for hosts without a timer of their own.
//!
//! The pacer itself never sleeps; this module supplies the missing clock. A
//! named worker thread ticks the pacer, then waits out the gap to the next
//! deadline with a hybrid strategy: sleep in short chunks while the gap is
//! large (each chunk doubling as a control-channel poll), then spin with
//! periodic yields across the last few hundred microseconds so frames land
//! on the deadline instead of a timer quantum after it.
//!
//! Control arrives over an mpsc channel and is drained before every tick,
//! so a pause or stop issued by the host is honored before the next frame
//! is emitted. Dropping the handle stops and joins the thread.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::core::EmulatorCore;
use crate::pacer::{EmulationPacer, PacerState};

/// Sleep granularity while the next deadline is still far away. Short
/// enough to keep control latency low on every platform's timer slack.
const MAX_SLEEP_CHUNK: Duration = Duration::from_millis(4);

/// Distance from the deadline at which sleeping stops and spinning starts.
const SPIN_THRESHOLD: Duration = Duration::from_micros(300);

/// How often the spin loop yields to the scheduler.
const SPIN_YIELD_EVERY: u32 = 512;

/// Poll period for control messages while the pacer is idle.
const IDLE_POLL: Duration = Duration::from_millis(10);

enum ControlMessage {
    Run,
    Pause,
    Step,
    Stop,
    SetRewinding(bool),
    SetFastForwarding(bool),
    SetSpeedPercent(u32),
    SetPad { port: usize, mask: u16 },
    SetTurboMask { port: usize, mask: u16 },
    SetTurboTiming { port: usize, on_frames: u32, off_frames: u32 },
}

/// Handle to a pacer running on its own thread.
///
/// All control methods are fire-and-forget; they queue a message the worker
/// applies before its next frame. Dropping the handle stops the worker and
/// joins it.
pub struct PacerHandle {
    tx: Option<Sender<ControlMessage>>,
    thread: Option<JoinHandle<()>>,
}

impl PacerHandle {
    /// Move `pacer` onto a new `"frame-pacer"` thread. Attach audio and
    /// register video consumers before spawning.
    ///
    /// # Errors
    ///
    /// Fails if the OS refuses to spawn the thread.
    pub fn spawn<C>(mut pacer: EmulationPacer<C>) -> Result<Self>
    where
        C: EmulatorCore + Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("frame-pacer".into())
            .spawn(move || run_loop(&mut pacer, &rx))
            .context("failed to spawn frame-pacer thread")?;
        Ok(Self {
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    pub fn run(&self) {
        self.send(ControlMessage::Run);
    }

    pub fn pause(&self) {
        self.send(ControlMessage::Pause);
    }

    /// Emit exactly one frame while paused.
    pub fn step(&self) {
        self.send(ControlMessage::Step);
    }

    pub fn set_rewinding(&self, rewinding: bool) {
        self.send(ControlMessage::SetRewinding(rewinding));
    }

    pub fn set_fast_forwarding(&self, fast_forwarding: bool) {
        self.send(ControlMessage::SetFastForwarding(fast_forwarding));
    }

    pub fn set_speed_percent(&self, percent: u32) {
        self.send(ControlMessage::SetSpeedPercent(percent));
    }

    pub fn set_pad(&self, port: usize, mask: u16) {
        self.send(ControlMessage::SetPad { port, mask });
    }

    pub fn set_turbo_mask(&self, port: usize, mask: u16) {
        self.send(ControlMessage::SetTurboMask { port, mask });
    }

    pub fn set_turbo_timing(&self, port: usize, on_frames: u32, off_frames: u32) {
        self.send(ControlMessage::SetTurboTiming {
            port,
            on_frames,
            off_frames,
        });
    }

    fn send(&self, message: ControlMessage) {
        if let Some(tx) = &self.tx {
            // A closed channel means the worker already exited; the drop
            // path will surface that via the join.
            let _ = tx.send(message);
        }
    }
}

impl Drop for PacerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(ControlMessage::Stop);
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            warn!("frame-pacer thread panicked");
        }
    }
}

/// Apply one control message. Returns true when the worker should exit.
fn handle_control<C: EmulatorCore>(pacer: &mut EmulationPacer<C>, message: ControlMessage) -> bool {
    match message {
        ControlMessage::Run => pacer.run(),
        ControlMessage::Pause => pacer.pause(),
        ControlMessage::Step => {
            if let Err(e) = pacer.step() {
                warn!(error = %e, "single step failed");
            }
        }
        ControlMessage::Stop => return true,
        ControlMessage::SetRewinding(rewinding) => pacer.set_rewinding(rewinding),
        ControlMessage::SetFastForwarding(ff) => pacer.set_fast_forwarding(ff),
        ControlMessage::SetSpeedPercent(percent) => pacer.set_speed_percent(percent),
        ControlMessage::SetPad { port, mask } => pacer.set_pad(port, mask),
        ControlMessage::SetTurboMask { port, mask } => pacer.set_turbo_mask(port, mask),
        ControlMessage::SetTurboTiming {
            port,
            on_frames,
            off_frames,
        } => pacer.set_turbo_timing(port, on_frames, off_frames),
    }
    false
}

fn run_loop<C: EmulatorCore>(pacer: &mut EmulationPacer<C>, rx: &Receiver<ControlMessage>) {
    debug!("frame-pacer thread started");
    loop {
        // Drain pending control before emitting anything.
        loop {
            match rx.try_recv() {
                Ok(message) => {
                    if handle_control(pacer, message) {
                        return;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return,
            }
        }

        if pacer.state() == PacerState::Idle {
            // Nothing scheduled; block on the channel instead of polling hot.
            match rx.recv_timeout(IDLE_POLL) {
                Ok(message) => {
                    if handle_control(pacer, message) {
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => return,
            }
            continue;
        }

        if let Err(e) = pacer.tick(Instant::now()) {
            // Fatal: the pacer idled itself. Stay alive so the host can
            // inspect and decide; the idle branch above takes over.
            warn!(error = %e, "tick failed, pacer idled");
            continue;
        }

        if let Some(deadline) = pacer.next_deadline()
            && !wait_until(rx, pacer, deadline)
        {
            return;
        }
    }
}

/// Wait until `deadline`, servicing control messages along the way.
/// Returns false when the worker should exit.
fn wait_until<C: EmulatorCore>(
    rx: &Receiver<ControlMessage>,
    pacer: &mut EmulationPacer<C>,
    deadline: Instant,
) -> bool {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return true;
        }
        let remaining = deadline - now;

        if remaining > SPIN_THRESHOLD {
            let chunk = (remaining - SPIN_THRESHOLD).min(MAX_SLEEP_CHUNK);
            match rx.recv_timeout(chunk) {
                Ok(message) => {
                    if handle_control(pacer, message) {
                        return false;
                    }
                    // Control may have re-anchored the schedule; let the
                    // main loop recompute the deadline.
                    return true;
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }

        // Close to the deadline: spin it out, still listening for control.
        let mut spins = 0u32;
        while Instant::now() < deadline {
            match rx.try_recv() {
                Ok(message) => {
                    if handle_control(pacer, message) {
                        return false;
                    }
                    return true;
                }
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return false,
            }
            std::hint::spin_loop();
            spins = spins.wrapping_add(1);
            if spins % SPIN_YIELD_EVERY == 0 {
                thread::yield_now();
            }
        }
        return true;
    }
}
