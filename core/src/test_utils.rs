//! Shared test doubles.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::core::{BYTES_PER_PIXEL, EmulatorCore, FrameFormat, NUM_PORTS};
use crate::error::StepError;

/// Route tracing output through the test harness. Safe to call from every
/// test; only the first call installs the subscriber.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Scripted emulator core for pacing and video tests.
///
/// Counts steps and rewinds through shared probes so tests can observe the
/// core after handing it to a pacer or another thread. Each frame fills the
/// video plane with a byte derived from the step count and produces a fixed
/// number of audio samples.
pub struct ScriptedCore {
    format: FrameFormat,
    samples_per_frame: usize,
    fail_on_step: Option<u64>,
    steps: Arc<AtomicU64>,
    rewinds: Arc<AtomicU64>,
    recorded_pads: Arc<Mutex<Vec<[u16; NUM_PORTS]>>>,
    /// Frames of history available to step back through.
    history: u64,
    audio: Vec<f32>,
}

impl ScriptedCore {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            format: FrameFormat::new(width, height),
            samples_per_frame: 8,
            fail_on_step: None,
            steps: Arc::new(AtomicU64::new(0)),
            rewinds: Arc::new(AtomicU64::new(0)),
            recorded_pads: Arc::new(Mutex::new(Vec::new())),
            history: 0,
            audio: Vec::new(),
        }
    }

    /// Fail the `n`-th call to `step_frame` (1-based).
    pub fn failing_on_step(mut self, n: u64) -> Self {
        self.fail_on_step = Some(n);
        self
    }

    pub fn steps(&self) -> u64 {
        self.steps.load(Ordering::SeqCst)
    }

    pub fn rewinds(&self) -> u64 {
        self.rewinds.load(Ordering::SeqCst)
    }

    /// Shared step counter, usable after the core is moved elsewhere.
    pub fn step_probe(&self) -> Arc<AtomicU64> {
        self.steps.clone()
    }

    pub fn recorded_pads(&self) -> Vec<[u16; NUM_PORTS]> {
        self.recorded_pads.lock().unwrap().clone()
    }

    /// Byte every pixel of the current frame is filled with.
    pub fn fill_byte(&self) -> u8 {
        (self.steps() % 251) as u8
    }
}

impl EmulatorCore for ScriptedCore {
    fn frame_format(&self) -> FrameFormat {
        self.format
    }

    fn step_frame(&mut self, pads: &[u16; NUM_PORTS]) -> Result<(), StepError> {
        let n = self.steps.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on_step == Some(n) {
            return Err(StepError("scripted step failure".into()));
        }
        self.recorded_pads.lock().unwrap().push(*pads);
        self.history += 1;
        self.audio = vec![n as f32 * 0.001; self.samples_per_frame];
        Ok(())
    }

    fn step_back(&mut self) -> Result<bool, StepError> {
        if self.history == 0 {
            return Ok(false);
        }
        self.history -= 1;
        self.rewinds.fetch_add(1, Ordering::SeqCst);
        self.audio.clear();
        Ok(true)
    }

    fn copy_frame(&self, dst: &mut [u8], dst_stride: usize) {
        let byte = self.fill_byte();
        let row_bytes = self.format.width as usize * BYTES_PER_PIXEL;
        for row in 0..self.format.height as usize {
            let start = row * dst_stride;
            dst[start..start + row_bytes].fill(byte);
        }
    }

    fn audio_samples(&self) -> &[f32] {
        &self.audio
    }
}
