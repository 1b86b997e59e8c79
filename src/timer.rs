//! Single-shot, cancellable delays.
//!
//! The coordinator never sleeps. Arming an [`OverlayTimer`] hands back a
//! [`TimerRequest`] that the host schedules; when the delay elapses the host
//! delivers the request's [`TimerToken`] back as an event. A slot only
//! honours the token from its latest arming, so a callback that was cancelled
//! or replaced is ignored even if it lands in the same tick as its
//! replacement.

use std::time::Duration;

use crate::display::BindingId;
use crate::events::OverlayVariant;

/// Identifies which owner a timer belongs to. Each slot holds at most one
/// outstanding timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    Overlay(OverlayVariant),
    Transition(BindingId),
    Pointer(BindingId),
    TopologyDebounce,
    PreferenceDebounce,
    NowPlayingPoll,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerToken {
    pub slot: TimerSlot,
    pub generation: u64,
}

/// A delay the host must schedule, delivering `token` once `after` elapses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerRequest {
    pub token: TimerToken,
    pub after: Duration,
}

#[derive(Debug)]
pub struct OverlayTimer {
    slot: TimerSlot,
    generation: u64,
    armed: bool,
    after: Option<Duration>,
}

impl OverlayTimer {
    pub fn new(slot: TimerSlot) -> Self {
        Self {
            slot,
            generation: 0,
            armed: false,
            after: None,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Delay of the current arming, if any.
    #[allow(dead_code)]
    pub fn pending_delay(&self) -> Option<Duration> {
        self.armed.then_some(self.after).flatten()
    }

    /// Arm the slot, superseding whatever was outstanding.
    pub fn start(&mut self, after: Duration) -> TimerRequest {
        self.generation += 1;
        self.armed = true;
        self.after = Some(after);
        TimerRequest {
            token: TimerToken {
                slot: self.slot,
                generation: self.generation,
            },
            after,
        }
    }

    /// Disarm the slot. Returns whether anything was outstanding.
    pub fn cancel(&mut self) -> bool {
        let was_armed = self.armed;
        self.armed = false;
        self.after = None;
        self.generation += 1;
        was_armed
    }

    /// Accept a fired token. Only the token from the latest arming of this
    /// slot is accepted, and only once.
    pub fn fire(&mut self, token: TimerToken) -> bool {
        if !self.armed || token.slot != self.slot || token.generation != self.generation {
            return false;
        }
        self.armed = false;
        self.after = None;
        true
    }
}
