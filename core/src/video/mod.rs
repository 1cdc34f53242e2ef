//! Tear-free video handoff from the emulator to host consumers.
//!
//! ```text
//!                       ┌─────────────────────────────┐
//!   pacer thread        │         FrameFanout         │
//!  ┌────────────┐       │  Weak<FrameSink> registry   │
//!  │  publish   ├──────▶│  copy + commit + notify     │
//!  └────────────┘       └──────┬───────────────┬──────┘
//!                              │               │
//!                   ┌──────────▼─────┐  ┌──────▼─────────┐
//!                   │ FrameSink      │  │ FrameSink      │
//!                   │ double buffer  │  │ double buffer  │
//!                   │ (display)      │  │ (capture)      │
//!                   └────────────────┘  └────────────────┘
//! ```
//!
//! Each consumer owns its own [`FrameDoubleBuffer`]: two fixed arenas, an
//! atomic latest-ready index, and a generation counter. Publishing copies
//! pixels into every live consumer's writable slot and commits with a single
//! atomic store; consumers read whenever they like and always see a complete
//! frame. No pixel bytes ever travel through the fanout itself.

mod double_buffer;
mod fanout;
mod frame;

#[cfg(test)]
mod tests;

pub use double_buffer::{FrameDoubleBuffer, FrameReadGuard, FrameWriteGuard};
pub use fanout::{ConsumerId, FrameFanout, FrameSink};
pub use frame::Frame;
