//! Ephemeral status overlays: sneak peeks and expanding items.
//!
//! Each variant has a single slot. Showing into an occupied slot replaces the
//! value wholesale and re-arms the slot's timer, so only the latest show ever
//! dismisses.

use std::time::{Duration, Instant};

use crate::events::{HardwareEvent, OverlayKind, OverlayVariant};
use crate::timer::{OverlayTimer, TimerRequest, TimerSlot, TimerToken};

/// Downloads always collapse after this long, whatever the caller asked for.
pub const DOWNLOAD_DURATION: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub struct SneakPeek {
    pub kind: OverlayKind,
    pub value: f32,
    pub icon: String,
    pub label: Option<String>,
    pub shown_at: Instant,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExpandingItem {
    pub kind: OverlayKind,
    pub value: f32,
    pub duration: Duration,
}

/// What a call to [`OverlayScheduler::show`] caused.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShowOutcome {
    /// Dismissal to schedule; `None` when the overlay was suppressed.
    pub timer: Option<TimerRequest>,
    /// New value for the persisted mic mirror, written even when suppressed.
    pub mic_muted: Option<bool>,
}

#[derive(Debug)]
pub struct OverlayScheduler {
    sneak_peek: Option<SneakPeek>,
    expanding: Option<ExpandingItem>,
    sneak_timer: OverlayTimer,
    expanding_timer: OverlayTimer,
    hud_replacement: bool,
}

impl OverlayScheduler {
    pub fn new(hud_replacement: bool) -> Self {
        Self {
            sneak_peek: None,
            expanding: None,
            sneak_timer: OverlayTimer::new(TimerSlot::Overlay(OverlayVariant::SneakPeek)),
            expanding_timer: OverlayTimer::new(TimerSlot::Overlay(OverlayVariant::ExpandingItem)),
            hud_replacement,
        }
    }

    pub fn set_replacement_mode(&mut self, enabled: bool) {
        self.hud_replacement = enabled;
    }

    pub fn sneak_peek(&self) -> Option<&SneakPeek> {
        self.sneak_peek.as_ref()
    }

    pub fn expanding_item(&self) -> Option<&ExpandingItem> {
        self.expanding.as_ref()
    }

    #[allow(dead_code)]
    pub fn is_showing(&self, variant: OverlayVariant) -> bool {
        match variant {
            OverlayVariant::SneakPeek => self.sneak_peek.is_some(),
            OverlayVariant::ExpandingItem => self.expanding.is_some(),
        }
    }

    fn timer_mut(&mut self, variant: OverlayVariant) -> &mut OverlayTimer {
        match variant {
            OverlayVariant::SneakPeek => &mut self.sneak_timer,
            OverlayVariant::ExpandingItem => &mut self.expanding_timer,
        }
    }

    pub fn show(&mut self, event: &HardwareEvent, duration: Duration) -> ShowOutcome {
        let mut outcome = ShowOutcome::default();
        if event.kind == OverlayKind::Mic {
            outcome.mic_muted = Some(event.value >= 0.5);
        }
        if !self.hud_replacement && event.kind != OverlayKind::Music {
            tracing::debug!("{:?} overlay suppressed (replacement mode off)", event.kind);
            return outcome;
        }

        let variant = event.kind.variant();
        let duration = match event.kind {
            OverlayKind::Download => DOWNLOAD_DURATION,
            _ => duration,
        };
        match variant {
            OverlayVariant::SneakPeek => {
                self.sneak_peek = Some(SneakPeek {
                    kind: event.kind,
                    value: event.value.clamp(0.0, 1.0),
                    icon: event
                        .icon
                        .clone()
                        .unwrap_or_else(|| event.kind.default_icon().to_string()),
                    label: event.label.clone(),
                    shown_at: Instant::now(),
                    duration,
                });
            }
            OverlayVariant::ExpandingItem => {
                self.expanding = Some(ExpandingItem {
                    kind: event.kind,
                    value: event.value.clamp(0.0, 1.0),
                    duration,
                });
            }
        }
        outcome.timer = Some(self.timer_mut(variant).start(duration));
        outcome
    }

    /// Cancel the variant's dismissal and clear it now.
    pub fn hide(&mut self, variant: OverlayVariant) -> bool {
        self.timer_mut(variant).cancel();
        match variant {
            OverlayVariant::SneakPeek => self.sneak_peek.take().is_some(),
            OverlayVariant::ExpandingItem => self.expanding.take().is_some(),
        }
    }

    /// Handle a dismissal timer. Only the latest show's token clears state.
    pub fn expire(&mut self, token: TimerToken) -> bool {
        let TimerSlot::Overlay(variant) = token.slot else {
            return false;
        };
        if !self.timer_mut(variant).fire(token) {
            tracing::debug!("stale {variant:?} dismissal ignored");
            return false;
        }
        match variant {
            OverlayVariant::SneakPeek => self.sneak_peek = None,
            OverlayVariant::ExpandingItem => self.expanding = None,
        }
        true
    }

    pub fn teardown(&mut self) {
        self.hide(OverlayVariant::SneakPeek);
        self.hide(OverlayVariant::ExpandingItem);
    }
}
