//! Open/close state machine for a single notch surface.

use std::time::Duration;

use crate::config::Preferences;
use crate::display::BindingId;
use crate::error::InvalidTransition;
use crate::geometry::{CLOSED_SIZE, OPEN_SIZE, Size};
use crate::timer::{OverlayTimer, TimerRequest, TimerSlot, TimerToken};

pub const OPEN_ANIMATION: Duration = Duration::from_millis(400);
pub const CLOSE_ANIMATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Closed,
    Opening,
    Open,
    Closing,
}

impl Phase {
    fn resting_size(self) -> Size {
        match self {
            Phase::Closed | Phase::Closing => CLOSED_SIZE,
            Phase::Open | Phase::Opening => OPEN_SIZE,
        }
    }
}

/// Pane shown when the notch is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotchView {
    #[default]
    Home,
    Shelf,
}

impl NotchView {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "home" => Some(NotchView::Home),
            "shelf" => Some(NotchView::Shelf),
            _ => None,
        }
    }
}

/// Decides which pane a surface shows the next time it opens, evaluated
/// each time a close completes.
pub trait ClosePolicy: Send + Sync {
    fn view_after_close(&self, current: NotchView, prefs: &Preferences) -> NotchView;
}

/// Returns to Home unless the user asked to remember the last pane.
#[derive(Debug, Clone, Copy, Default)]
pub struct HomeAfterClose;

impl ClosePolicy for HomeAfterClose {
    fn view_after_close(&self, current: NotchView, prefs: &Preferences) -> NotchView {
        if prefs.remember_last_view {
            current
        } else {
            NotchView::Home
        }
    }
}

/// Read-only view of a surface handed to the rendering layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSnapshot {
    pub phase: Phase,
    pub current_size: Size,
    pub target_size: Size,
    pub view: NotchView,
}

#[derive(Debug)]
pub struct SurfaceStateMachine {
    phase: Phase,
    current_size: Size,
    target_size: Size,
    view: NotchView,
    transition: OverlayTimer,
}

impl SurfaceStateMachine {
    pub fn new(binding: BindingId) -> Self {
        Self {
            phase: Phase::Closed,
            current_size: CLOSED_SIZE,
            target_size: CLOSED_SIZE,
            view: NotchView::default(),
            transition: OverlayTimer::new(TimerSlot::Transition(binding)),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[allow(dead_code)]
    pub fn is_transitioning(&self) -> bool {
        self.transition.is_armed()
    }

    pub fn snapshot(&self) -> SurfaceSnapshot {
        SurfaceSnapshot {
            phase: self.phase,
            current_size: self.current_size,
            target_size: self.target_size,
            view: self.view,
        }
    }

    pub fn open(&mut self) -> Result<TimerRequest, InvalidTransition> {
        if self.phase != Phase::Closed || self.transition.is_armed() {
            return Err(self.reject("open"));
        }
        self.phase = Phase::Opening;
        self.target_size = OPEN_SIZE;
        Ok(self.transition.start(OPEN_ANIMATION))
    }

    pub fn close(&mut self) -> Result<TimerRequest, InvalidTransition> {
        if self.phase != Phase::Open || self.transition.is_armed() {
            return Err(self.reject("close"));
        }
        self.phase = Phase::Closing;
        self.target_size = CLOSED_SIZE;
        Ok(self.transition.start(CLOSE_ANIMATION))
    }

    fn reject(&self, requested: &'static str) -> InvalidTransition {
        let err = InvalidTransition {
            from: self.phase,
            requested,
        };
        tracing::debug!("ignored: {err}");
        err
    }

    /// Apply a transition-complete callback. Stale tokens are ignored.
    /// `next_view` is consulted only when a close lands.
    pub fn complete(
        &mut self,
        token: TimerToken,
        next_view: impl FnOnce(NotchView) -> NotchView,
    ) -> bool {
        if !self.transition.fire(token) {
            tracing::debug!("stale transition timer {token:?}");
            return false;
        }
        match self.phase {
            Phase::Opening => {
                self.phase = Phase::Open;
                self.current_size = self.target_size;
            }
            Phase::Closing => {
                self.phase = Phase::Closed;
                self.current_size = self.target_size;
                self.view = next_view(self.view);
            }
            // A resting phase never owns an armed transition timer.
            Phase::Closed | Phase::Open => return false,
        }
        true
    }

    /// Snap to `phase`, discarding any transition in flight. A transitional
    /// phase is re-armed under a fresh token so it still lands.
    pub fn force_reset(&mut self, phase: Phase) -> Option<TimerRequest> {
        self.transition.cancel();
        self.phase = phase;
        self.target_size = phase.resting_size();
        match phase {
            Phase::Closed | Phase::Open => {
                self.current_size = self.target_size;
                None
            }
            Phase::Opening => Some(self.transition.start(OPEN_ANIMATION)),
            Phase::Closing => Some(self.transition.start(CLOSE_ANIMATION)),
        }
    }

    pub fn set_view(&mut self, view: NotchView) {
        self.view = view;
    }

    pub fn teardown(&mut self) {
        self.transition.cancel();
    }
}
