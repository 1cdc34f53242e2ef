//! Controller state resolution.
//!
//! The host pushes raw pad state (held buttons, turbo assignments) whenever
//! it likes; once per emulated frame the pacer asks the resolver for the
//! effective masks to feed the core. Turbo phases advance in emulated
//! frames, not wall time, so duty cycles stay exact at any emulation speed.

mod pads;
mod turbo;


pub use pads::{PadStateResolver, ResolvedInput};
pub use turbo::TurboPhaseGenerator;
