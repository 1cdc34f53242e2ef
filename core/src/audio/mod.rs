//! Audio path between the emulator and the host device.
//!
//! ```text
//!   pacer thread                          audio device thread
//!  ┌────────────┐   push (per frame)    ┌──────────────────────┐
//!  │ step_frame ├──────────────────────▶│      SampleRing      │
//!  └────────────┘                       │ drop-oldest + trim   │
//!                                       └──────────┬───────────┘
//!                                                  │ pull (per callback)
//!                                       ┌──────────▼───────────┐
//!                                       │     AudioOutput      │
//!                                       │ downmix / silence    │
//!                                       └──────────────────────┘
//! ```
//!
//! The ring is the only shared state. The producer never blocks on the
//! device and the device callback only ever performs a bounded copy.

mod output;
mod ring;


pub use output::AudioOutput;
pub use ring::{CHANNELS, RingThresholds, SampleRing};
