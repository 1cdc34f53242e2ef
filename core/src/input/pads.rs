//! Per-frame pad state resolution.

use tracing::debug;

use super::turbo::TurboPhaseGenerator;
use crate::core::NUM_PORTS;

#[derive(Debug, Clone, Copy)]
struct PortState {
    base_mask: u16,
    turbo_mask: u16,
    turbo: TurboPhaseGenerator,
}

impl PortState {
    fn new() -> Self {
        Self {
            base_mask: 0,
            turbo_mask: 0,
            turbo: TurboPhaseGenerator::default(),
        }
    }
}

/// Effective input for one emulated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedInput {
    /// Button mask per controller port.
    pub masks: [u16; NUM_PORTS],
    /// Any bit set on any port. Pressing anything cancels an active rewind.
    pub any_input: bool,
}

/// Combines held buttons with each port's turbo phase into the masks the
/// emulator sees.
///
/// Host setters may run at event rate; [`resolve_frame`](Self::resolve_frame)
/// runs once per emitted virtual frame and is the only thing that moves the
/// turbo generators.
pub struct PadStateResolver {
    ports: [PortState; NUM_PORTS],
}

impl PadStateResolver {
    pub fn new() -> Self {
        Self {
            ports: [PortState::new(); NUM_PORTS],
        }
    }

    /// Set the held-button mask for a port. Out-of-range ports are ignored.
    pub fn set_pad(&mut self, port: usize, mask: u16) {
        let Some(state) = self.ports.get_mut(port) else {
            debug!(port, "pad update for nonexistent port ignored");
            return;
        };
        state.base_mask = mask;
    }

    /// Set the turbo-assigned buttons for a port.
    ///
    /// A transition from no turbo buttons to some restarts the phase so the
    /// press fires on its very first frame.
    pub fn set_turbo_mask(&mut self, port: usize, mask: u16) {
        let Some(state) = self.ports.get_mut(port) else {
            debug!(port, "turbo update for nonexistent port ignored");
            return;
        };
        if state.turbo_mask == 0 && mask != 0 {
            state.turbo.reset();
        }
        state.turbo_mask = mask;
    }

    /// Set a port's turbo duty cycle. Zero counts are clamped to 1.
    pub fn set_turbo_timing(&mut self, port: usize, on_frames: u32, off_frames: u32) {
        let Some(state) = self.ports.get_mut(port) else {
            debug!(port, "turbo timing for nonexistent port ignored");
            return;
        };
        state.turbo.set_timing(on_frames, off_frames);
    }

    /// Held-button mask currently set for a port.
    pub fn pad_mask(&self, port: usize) -> u16 {
        self.ports.get(port).map_or(0, |p| p.base_mask)
    }

    /// Compute the effective masks for the frame about to run.
    ///
    /// Advances the turbo generator of every port with a nonzero turbo mask;
    /// idle generators hold their phase so a later press starts fresh from
    /// its reset, not from a drifted position.
    pub fn resolve_frame(&mut self) -> ResolvedInput {
        let mut masks = [0u16; NUM_PORTS];
        let mut any_input = false;
        for (mask, port) in masks.iter_mut().zip(self.ports.iter_mut()) {
            let turbo_bits = if port.turbo_mask != 0 {
                port.turbo.advance();
                if port.turbo.is_on() { port.turbo_mask } else { 0 }
            } else {
                0
            };
            *mask = port.base_mask | turbo_bits;
            any_input |= *mask != 0;
        }
        ResolvedInput { masks, any_input }
    }
}

impl Default for PadStateResolver {
    fn default() -> Self {
        Self::new()
    }
}
