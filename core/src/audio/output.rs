//! Host audio output stream fed from the sample ring.
//!
//! The device callback drains the ring, maps stereo onto however many
//! channels the device exposes, and pads with silence when the ring runs
//! dry. A pending clear request is serviced at the top of the callback so a
//! rewind can flush stale forward-audio without touching the stream.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error};

use super::ring::{CHANNELS, SampleRing};
use crate::error::AudioOutputError;

/// Expand interleaved stereo frames into the device's channel layout.
///
/// Mono devices get a downmix, devices with more than two channels get the
/// right channel mirrored onto the extras.
pub(super) fn layout_channels(staging: &mut [f32], pulled: &[f32], channels: usize) {
    for (frame, src) in staging.chunks_mut(channels).zip(pulled.chunks(CHANNELS)) {
        let (l, r) = (src[0], src[1]);
        if channels == 1 {
            frame[0] = (l + r) * 0.5;
        } else {
            frame[0] = l;
            for ch in &mut frame[1..] {
                *ch = r;
            }
        }
    }
}

/// Audio output on the host's default device.
///
/// Owns the stream and the [`SampleRing`] the pacer pushes into. The ring is
/// sized for the device's native rate; the emulator is expected to produce
/// samples at that rate (resampling is the producer's concern).
pub struct AudioOutput {
    ring: Arc<SampleRing>,
    clear_flag: Arc<AtomicBool>,

    /// The cpal stream (kept alive for the duration)
    _stream: cpal::Stream,

    /// Output sample rate
    sample_rate: u32,
}

impl AudioOutput {
    /// Open the default output device and start the stream.
    ///
    /// # Errors
    ///
    /// Fails when no output device exists, the device's sample format is not
    /// one of f32/i16/u16, or the stream cannot be built or started.
    pub fn new() -> Result<Self, AudioOutputError> {
        use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(AudioOutputError::NoDevice)?;

        let config = device.default_output_config()?;
        let sample_rate = config.sample_rate().0;
        let channels = (config.channels() as usize).max(1);

        let ring = Arc::new(SampleRing::for_device_rate(sample_rate));
        let clear_flag = Arc::new(AtomicBool::new(false));

        let err_fn = |err| error!("audio stream error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => {
                let config = config.into();
                let ring = ring.clone();
                let clear_flag = clear_flag.clone();
                let mut pull_buf: Vec<f32> = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        if clear_flag.swap(false, Ordering::SeqCst) {
                            ring.clear();
                        }
                        let frames = data.len() / channels;
                        let wanted = frames * CHANNELS;
                        if pull_buf.len() < wanted {
                            pull_buf.resize(wanted, 0.0);
                        }
                        // pull() pads the shortfall with silence already
                        ring.pull(&mut pull_buf[..wanted]);
                        layout_channels(&mut data[..frames * channels], &pull_buf[..wanted], channels);
                    },
                    err_fn,
                    None,
                )?
            }
            cpal::SampleFormat::I16 => {
                let config = config.into();
                let ring = ring.clone();
                let clear_flag = clear_flag.clone();
                let mut pull_buf: Vec<f32> = Vec::new();
                let mut staging: Vec<f32> = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                        if clear_flag.swap(false, Ordering::SeqCst) {
                            ring.clear();
                        }
                        let frames = data.len() / channels;
                        let wanted = frames * CHANNELS;
                        if pull_buf.len() < wanted {
                            pull_buf.resize(wanted, 0.0);
                        }
                        if staging.len() < data.len() {
                            staging.resize(data.len(), 0.0);
                        }
                        ring.pull(&mut pull_buf[..wanted]);
                        layout_channels(&mut staging[..frames * channels], &pull_buf[..wanted], channels);
                        for (out, &f) in data.iter_mut().zip(staging.iter()) {
                            *out = (f * 32767.0).clamp(-32768.0, 32767.0) as i16;
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            cpal::SampleFormat::U16 => {
                let config = config.into();
                let ring = ring.clone();
                let clear_flag = clear_flag.clone();
                let mut pull_buf: Vec<f32> = Vec::new();
                let mut staging: Vec<f32> = Vec::new();
                device.build_output_stream(
                    &config,
                    move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                        if clear_flag.swap(false, Ordering::SeqCst) {
                            ring.clear();
                        }
                        let frames = data.len() / channels;
                        let wanted = frames * CHANNELS;
                        if pull_buf.len() < wanted {
                            pull_buf.resize(wanted, 0.0);
                        }
                        if staging.len() < data.len() {
                            staging.resize(data.len(), 0.0);
                        }
                        ring.pull(&mut pull_buf[..wanted]);
                        layout_channels(&mut staging[..frames * channels], &pull_buf[..wanted], channels);
                        for (out, &f) in data.iter_mut().zip(staging.iter()) {
                            *out = ((f * 32767.0 + 32768.0).clamp(0.0, 65535.0)) as u16;
                        }
                    },
                    err_fn,
                    None,
                )?
            }
            other => return Err(AudioOutputError::UnsupportedFormat(other)),
        };

        stream.play()?;

        debug!(sample_rate, channels, "audio output stream started");

        Ok(Self {
            ring,
            clear_flag,
            _stream: stream,
            sample_rate,
        })
    }

    /// The ring the pacer should push frame audio into.
    pub fn ring(&self) -> &Arc<SampleRing> {
        &self.ring
    }

    /// Ask the callback to flush all buffered audio before its next pull.
    pub fn request_clear(&self) {
        self.clear_flag.store(true, Ordering::SeqCst);
    }

    /// Get the output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}
