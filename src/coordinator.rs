//! The coordination context.
//!
//! A [`Coordinator`] owns every piece of mutable notch state and is driven by
//! exactly one thread. Producers never touch it directly: they deliver
//! [`Event`]s, and each call to [`Coordinator::handle`] returns the
//! [`Effect`]s the host must perform (schedule a timer, open or release a
//! surface, persist something, start a query). Results come back as more
//! events, so every mutation happens on the owning thread.

use std::time::Duration;

use crate::config::Preferences;
use crate::display::reconciler::{ReconcileReport, SurfaceChange};
use crate::display::{BindingId, DisplayBinding, DisplayName, DisplayReconciler, Topology};
use crate::error::CoordinatorError;
use crate::events::{Event, HardwareEvent, OverlayKind, Shortcut};
use crate::geometry::Rect;
use crate::media::{QueryGate, QueryTicket, TrackInfo};
use crate::notch::{ClosePolicy, Phase, SurfaceSnapshot};
use crate::overlay::{ExpandingItem, OverlayScheduler, SneakPeek};
use crate::timer::{OverlayTimer, TimerRequest, TimerSlot, TimerToken};

/// Trailing debounce for topology and preference bursts.
pub const DEBOUNCE: Duration = Duration::from_millis(300);

pub const NOW_PLAYING_POLL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Deliver `Event::TimerFired(token)` after the delay.
    Schedule(TimerRequest),
    CreateSurface {
        binding: BindingId,
        display: DisplayName,
        placement: Rect,
    },
    DestroySurface {
        binding: BindingId,
    },
    MoveSurface {
        binding: BindingId,
        display: DisplayName,
        placement: Rect,
    },
    SelectionChanged(DisplayName),
    PersistSelectedDisplay(DisplayName),
    PersistMicMuted(bool),
    /// Fetch the current track, replying with `Event::NowPlaying`.
    QueryNowPlaying(QueryTicket),
}

pub struct Coordinator {
    prefs: Preferences,
    policy: Box<dyn ClosePolicy>,
    overlay: OverlayScheduler,
    displays: DisplayReconciler,
    topology_debounce: OverlayTimer,
    preference_debounce: OverlayTimer,
    pending_topology: Option<Topology>,
    pending_prefs: Option<Preferences>,
    now_playing_poll: OverlayTimer,
    now_playing: QueryGate,
    track: Option<TrackInfo>,
    mic_muted: bool,
    /// Process-local display choice that outranks `prefs.selected_display`.
    screen_override: Option<DisplayName>,
    shut_down: bool,
}

impl Coordinator {
    pub fn new(prefs: Preferences, policy: Box<dyn ClosePolicy>) -> Self {
        Self {
            overlay: OverlayScheduler::new(prefs.hud_replacement),
            prefs,
            policy,
            displays: DisplayReconciler::new(),
            topology_debounce: OverlayTimer::new(TimerSlot::TopologyDebounce),
            preference_debounce: OverlayTimer::new(TimerSlot::PreferenceDebounce),
            pending_topology: None,
            pending_prefs: None,
            now_playing_poll: OverlayTimer::new(TimerSlot::NowPlayingPoll),
            now_playing: QueryGate::default(),
            track: None,
            mic_muted: false,
            screen_override: None,
            shut_down: false,
        }
    }

    /// Restore the mirrored mic state from a previous run.
    pub fn with_mic_muted(mut self, muted: bool) -> Self {
        self.mic_muted = muted;
        self
    }

    /// Pin the notch to `name` for this process. Preferences keep their own
    /// selection and a fallback away from `name` is never persisted.
    pub fn with_screen_override(mut self, name: Option<String>) -> Self {
        self.screen_override = name.map(DisplayName::new);
        self
    }

    /// Kick off background polling.
    pub fn start(&mut self) -> Vec<Effect> {
        if self.shut_down {
            return Vec::new();
        }
        self.poll_now_playing()
    }

    // --- read-only projections for the rendering layer ---

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    pub fn mic_muted(&self) -> bool {
        self.mic_muted
    }

    pub fn now_playing(&self) -> Option<&TrackInfo> {
        self.track.as_ref()
    }

    pub fn bindings(&self) -> impl Iterator<Item = &DisplayBinding> {
        self.displays.bindings()
    }

    pub fn surface(&self, binding: BindingId) -> Option<SurfaceSnapshot> {
        self.displays
            .binding(binding)
            .map(|b| b.surface().snapshot())
    }

    /// Binding the process-wide overlay is projected onto.
    pub fn overlay_target(&self) -> Option<BindingId> {
        self.displays
            .selected()
            .and_then(|name| self.displays.binding_for(name))
            .or_else(|| self.displays.bindings().next())
            .map(DisplayBinding::id)
    }

    pub fn sneak_peek_for(&self, binding: BindingId) -> Option<&SneakPeek> {
        (self.overlay_target() == Some(binding))
            .then(|| self.overlay.sneak_peek())
            .flatten()
    }

    pub fn expanding_item_for(&self, binding: BindingId) -> Option<&ExpandingItem> {
        (self.overlay_target() == Some(binding))
            .then(|| self.overlay.expanding_item())
            .flatten()
    }

    // --- event handling ---

    pub fn handle(&mut self, event: Event) -> Vec<Effect> {
        if self.shut_down {
            tracing::debug!("event after shutdown ignored: {event:?}");
            return Vec::new();
        }
        match event {
            Event::Topology(topology) => {
                self.pending_topology = Some(topology);
                vec![Effect::Schedule(self.topology_debounce.start(DEBOUNCE))]
            }
            Event::PreferencesChanged(prefs) => {
                self.pending_prefs = Some(prefs);
                vec![Effect::Schedule(self.preference_debounce.start(DEBOUNCE))]
            }
            Event::Hardware(hw) => self.show_overlay(&hw),
            Event::Shortcut(shortcut) => self.handle_shortcut(shortcut),
            Event::Pointer { binding, inside } => self.handle_pointer(binding, inside),
            Event::TimerFired(token) => self.handle_timer(token),
            Event::NowPlaying { ticket, track } => self.handle_now_playing(ticket, track),
            Event::Shutdown => self.shutdown(),
        }
    }

    fn show_overlay(&mut self, hw: &HardwareEvent) -> Vec<Effect> {
        let duration = hw.duration.unwrap_or_else(|| self.prefs.auto_hide_wait());
        let outcome = self.overlay.show(hw, duration);
        let mut effects = Vec::new();
        if let Some(muted) = outcome.mic_muted {
            self.mic_muted = muted;
            effects.push(Effect::PersistMicMuted(muted));
        }
        if let Some(req) = outcome.timer {
            effects.push(Effect::Schedule(req));
        }
        effects
    }

    fn target_mut(&mut self, target: Option<&DisplayName>) -> Option<&mut DisplayBinding> {
        match target {
            Some(name) => self.displays.binding_for_mut(name),
            None => self.displays.selected_binding_mut(),
        }
    }

    fn handle_shortcut(&mut self, shortcut: Shortcut) -> Vec<Effect> {
        let request = match shortcut {
            Shortcut::Hide(variant) => {
                self.overlay.hide(variant);
                return Vec::new();
            }
            Shortcut::Open(target) => self.with_target(target.as_ref(), |b| {
                b.cancel_pointer();
                b.surface_mut().open().ok()
            }),
            Shortcut::Close(target) => self.with_target(target.as_ref(), |b| {
                b.cancel_pointer();
                b.surface_mut().close().ok()
            }),
            Shortcut::Toggle(target) => self.with_target(target.as_ref(), |b| {
                b.cancel_pointer();
                match b.surface().phase() {
                    Phase::Closed => b.surface_mut().open().ok(),
                    Phase::Open => b.surface_mut().close().ok(),
                    phase => {
                        tracing::debug!("toggle ignored while {phase:?}");
                        None
                    }
                }
            }),
            Shortcut::ShowView(view) => self.with_target(None, |b| {
                b.surface_mut().set_view(view);
                match b.surface().phase() {
                    Phase::Closed => b.surface_mut().open().ok(),
                    _ => None,
                }
            }),
        };
        request.map(Effect::Schedule).into_iter().collect()
    }

    fn with_target(
        &mut self,
        target: Option<&DisplayName>,
        f: impl FnOnce(&mut DisplayBinding) -> Option<TimerRequest>,
    ) -> Option<TimerRequest> {
        match self.target_mut(target) {
            Some(binding) => f(binding),
            None => {
                tracing::debug!("shortcut without a target display: {target:?}");
                None
            }
        }
    }

    fn binding_or_log(&mut self, id: BindingId) -> Option<&mut DisplayBinding> {
        let binding = self.displays.binding_mut(id);
        if binding.is_none() {
            tracing::debug!("dropped: {}", CoordinatorError::DisplayBindingMissing(id));
        }
        binding
    }

    fn handle_pointer(&mut self, id: BindingId, inside: bool) -> Vec<Effect> {
        let hover_delay = self.prefs.hover_delay();
        let leave_delay = self.prefs.auto_hide_wait();
        let Some(binding) = self.binding_or_log(id) else {
            return Vec::new();
        };
        let phase = binding.surface().phase();
        let request = match (inside, phase) {
            (true, Phase::Closed) => Some(binding.arm_pointer(hover_delay)),
            (false, Phase::Open) => Some(binding.arm_pointer(leave_delay)),
            _ => {
                binding.cancel_pointer();
                None
            }
        };
        request.map(Effect::Schedule).into_iter().collect()
    }

    fn handle_timer(&mut self, token: TimerToken) -> Vec<Effect> {
        match token.slot {
            TimerSlot::Overlay(_) => {
                self.overlay.expire(token);
                Vec::new()
            }
            TimerSlot::Transition(id) => {
                let policy = &self.policy;
                let prefs = &self.prefs;
                match self.displays.binding_mut(id) {
                    Some(binding) => {
                        binding
                            .surface_mut()
                            .complete(token, |view| policy.view_after_close(view, prefs));
                    }
                    None => {
                        tracing::debug!("dropped: {}", CoordinatorError::DisplayBindingMissing(id))
                    }
                }
                Vec::new()
            }
            TimerSlot::Pointer(id) => {
                let Some(binding) = self.binding_or_log(id) else {
                    return Vec::new();
                };
                if !binding.fire_pointer(token) {
                    return Vec::new();
                }
                let request = match binding.surface().phase() {
                    Phase::Closed => binding.surface_mut().open().ok(),
                    Phase::Open => binding.surface_mut().close().ok(),
                    _ => None,
                };
                request.map(Effect::Schedule).into_iter().collect()
            }
            TimerSlot::TopologyDebounce => {
                if !self.topology_debounce.fire(token) {
                    return Vec::new();
                }
                match self.pending_topology.take() {
                    Some(topology) => self.reconcile(topology),
                    None => Vec::new(),
                }
            }
            TimerSlot::PreferenceDebounce => {
                if !self.preference_debounce.fire(token) {
                    return Vec::new();
                }
                match self.pending_prefs.take() {
                    Some(prefs) => self.apply_preferences(prefs),
                    None => Vec::new(),
                }
            }
            TimerSlot::NowPlayingPoll => {
                if !self.now_playing_poll.fire(token) {
                    return Vec::new();
                }
                self.poll_now_playing()
            }
        }
    }

    fn apply_preferences(&mut self, prefs: Preferences) -> Vec<Effect> {
        if prefs == self.prefs {
            return Vec::new();
        }
        tracing::info!("preferences applied");
        self.overlay.set_replacement_mode(prefs.hud_replacement);
        self.prefs = prefs;
        let topology = self.displays.topology().clone();
        self.reconcile(topology)
    }

    fn reconcile(&mut self, topology: Topology) -> Vec<Effect> {
        let report = match &self.screen_override {
            Some(name) => {
                let pinned = Preferences {
                    selected_display: Some(name.as_str().to_string()),
                    ..self.prefs.clone()
                };
                self.displays.reconcile(topology, &pinned)
            }
            None => self.displays.reconcile(topology, &self.prefs),
        };
        self.report_effects(report)
    }

    fn report_effects(&mut self, report: ReconcileReport) -> Vec<Effect> {
        let mut effects: Vec<Effect> = report
            .changes
            .into_iter()
            .map(|change| match change {
                SurfaceChange::Create {
                    binding,
                    display,
                    placement,
                } => Effect::CreateSurface {
                    binding,
                    display,
                    placement,
                },
                SurfaceChange::Destroy { binding } => Effect::DestroySurface { binding },
                SurfaceChange::Move {
                    binding,
                    display,
                    placement,
                } => Effect::MoveSurface {
                    binding,
                    display,
                    placement,
                },
            })
            .collect();
        if let Some(name) = report.selection_changed {
            effects.push(Effect::SelectionChanged(name));
        }
        if let Some(name) = report.persist_selection {
            if let Some(pinned) = &self.screen_override {
                tracing::info!("override {pinned} unavailable; showing on {name} for now");
            } else {
                tracing::info!("selected display unavailable; falling back to {name}");
                self.prefs.selected_display = Some(name.as_str().to_string());
                effects.push(Effect::PersistSelectedDisplay(name));
            }
        }
        effects
    }

    fn poll_now_playing(&mut self) -> Vec<Effect> {
        let ticket = self.now_playing.begin();
        vec![
            Effect::QueryNowPlaying(ticket),
            Effect::Schedule(self.now_playing_poll.start(NOW_PLAYING_POLL)),
        ]
    }

    fn handle_now_playing(&mut self, ticket: QueryTicket, track: Option<TrackInfo>) -> Vec<Effect> {
        if !self.now_playing.accept(ticket) {
            tracing::debug!("discarding superseded now-playing result");
            return Vec::new();
        }
        let changed = match (&self.track, &track) {
            (Some(old), Some(new)) => old.title != new.title || old.artist != new.artist,
            (None, Some(_)) => true,
            _ => false,
        };
        let label = track
            .as_ref()
            .filter(|t| changed && t.playing)
            .map(TrackInfo::display_label);
        self.track = track;
        match label {
            Some(label) => {
                let hw = HardwareEvent::new(OverlayKind::Music, 1.0).with_label(label);
                self.show_overlay(&hw)
            }
            None => Vec::new(),
        }
    }

    /// Tear everything down. Safe to call more than once; later events are
    /// ignored.
    pub fn shutdown(&mut self) -> Vec<Effect> {
        if self.shut_down {
            return Vec::new();
        }
        self.shut_down = true;
        tracing::info!("coordinator shutting down");
        self.overlay.teardown();
        self.topology_debounce.cancel();
        self.preference_debounce.cancel();
        self.now_playing_poll.cancel();
        self.now_playing.cancel();
        self.pending_topology = None;
        self.pending_prefs = None;
        self.displays
            .teardown()
            .into_iter()
            .map(|binding| Effect::DestroySurface { binding })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::Display;
    use crate::events::OverlayVariant;
    use crate::notch::{CLOSE_ANIMATION, HomeAfterClose, NotchView, OPEN_ANIMATION};
    use crate::overlay::DOWNLOAD_DURATION;

    fn coordinator(prefs: Preferences) -> Coordinator {
        Coordinator::new(prefs, Box::new(HomeAfterClose))
    }

    fn all_displays() -> Preferences {
        Preferences {
            show_on_all_displays: true,
            ..Preferences::default()
        }
    }

    fn display(name: &str, x: f32) -> Display {
        Display::new(name, Rect::new(x, 0.0, 1920.0, 1080.0))
    }

    fn topology(displays: &[Display]) -> Topology {
        Topology {
            displays: displays.to_vec(),
            primary: displays.first().map(|d| d.name.clone()),
        }
    }

    fn timers(effects: &[Effect]) -> Vec<TimerRequest> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Schedule(req) => Some(*req),
                _ => None,
            })
            .collect()
    }

    fn only_timer(effects: &[Effect]) -> TimerRequest {
        let found = timers(effects);
        assert_eq!(found.len(), 1, "expected one timer in {effects:?}");
        found[0]
    }

    /// Deliver a topology and let its debounce elapse.
    fn settle(c: &mut Coordinator, topo: Topology) -> Vec<Effect> {
        let req = only_timer(&c.handle(Event::Topology(topo)));
        assert_eq!(req.after, DEBOUNCE);
        c.handle(Event::TimerFired(req.token))
    }

    fn binding_on(c: &Coordinator, name: &str) -> BindingId {
        c.bindings()
            .find(|b| b.display().name.as_str() == name)
            .map(DisplayBinding::id)
            .unwrap()
    }

    #[test]
    fn topology_creates_surfaces_after_debounce() {
        let mut c = coordinator(all_displays());
        let effects = settle(&mut c, topology(&[display("eDP-1", 0.0), display("DP-1", 1920.0)]));
        let created = effects
            .iter()
            .filter(|e| matches!(e, Effect::CreateSurface { .. }))
            .count();
        assert_eq!(created, 2);
        assert!(effects.contains(&Effect::SelectionChanged(DisplayName::new("eDP-1"))));
    }

    #[test]
    fn topology_burst_reconciles_once_with_latest() {
        let mut c = coordinator(all_displays());
        let first = only_timer(&c.handle(Event::Topology(topology(&[display("eDP-1", 0.0)]))));
        let second = only_timer(&c.handle(Event::Topology(topology(&[
            display("eDP-1", 0.0),
            display("DP-1", 1920.0),
        ]))));
        assert!(c.handle(Event::TimerFired(first.token)).is_empty());
        assert_eq!(c.bindings().count(), 0);
        c.handle(Event::TimerFired(second.token));
        assert_eq!(c.bindings().count(), 2);
    }

    #[test]
    fn open_then_close_through_timers() {
        let mut c = coordinator(Preferences::default());
        settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        let id = binding_on(&c, "eDP-1");

        let open = only_timer(&c.handle(Event::Shortcut(Shortcut::Open(None))));
        assert_eq!(open.after, OPEN_ANIMATION);
        assert_eq!(c.surface(id).unwrap().phase, Phase::Opening);
        // Second open while opening: no-op, no timer.
        assert!(c.handle(Event::Shortcut(Shortcut::Open(None))).is_empty());
        c.handle(Event::TimerFired(open.token));
        assert_eq!(c.surface(id).unwrap().phase, Phase::Open);

        c.handle(Event::Shortcut(Shortcut::ShowView(NotchView::Shelf)));
        let close = only_timer(&c.handle(Event::Shortcut(Shortcut::Toggle(None))));
        assert_eq!(close.after, CLOSE_ANIMATION);
        c.handle(Event::TimerFired(close.token));
        let snap = c.surface(id).unwrap();
        assert_eq!(snap.phase, Phase::Closed);
        assert_eq!(snap.view, NotchView::Home);
    }

    #[test]
    fn removed_display_timer_has_no_effect() {
        let mut c = coordinator(all_displays());
        let a = display("eDP-1", 0.0);
        let b = display("DP-1", 1920.0);
        settle(&mut c, topology(&[a.clone(), b]));
        let gone = binding_on(&c, "DP-1");
        let kept = binding_on(&c, "eDP-1");

        let name = DisplayName::new("DP-1");
        let open = only_timer(&c.handle(Event::Shortcut(Shortcut::Open(Some(name)))));
        let hover = only_timer(&c.handle(Event::Pointer {
            binding: kept,
            inside: true,
        }));
        c.handle(Event::Pointer {
            binding: kept,
            inside: false,
        });

        let effects = settle(&mut c, topology(&[a]));
        assert!(effects.contains(&Effect::DestroySurface { binding: gone }));
        let before = c.surface(kept);

        assert!(c.handle(Event::TimerFired(open.token)).is_empty());
        assert!(c.handle(Event::TimerFired(hover.token)).is_empty());
        assert!(c.surface(gone).is_none());
        assert_eq!(c.surface(kept), before);
        assert!(c
            .handle(Event::Pointer {
                binding: gone,
                inside: true
            })
            .is_empty());
    }

    #[test]
    fn reshow_dismisses_once_at_latest_duration() {
        let mut c = coordinator(Preferences::default());
        settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        let id = binding_on(&c, "eDP-1");
        let vol = |v| {
            Event::Hardware(HardwareEvent::new(OverlayKind::Volume, v).with_duration(Duration::from_secs(4)))
        };

        let first = only_timer(&c.handle(vol(0.3)));
        let second = only_timer(&c.handle(Event::Hardware(
            HardwareEvent::new(OverlayKind::Volume, 0.6).with_duration(Duration::from_secs(1)),
        )));
        assert_eq!(second.after, Duration::from_secs(1));

        c.handle(Event::TimerFired(first.token));
        assert_eq!(c.sneak_peek_for(id).map(|p| p.value), Some(0.6));
        c.handle(Event::TimerFired(second.token));
        assert!(c.sneak_peek_for(id).is_none());
    }

    #[test]
    fn default_duration_is_auto_hide_wait() {
        let mut c = coordinator(Preferences {
            auto_hide_wait_ms: 1500,
            ..Preferences::default()
        });
        let req = only_timer(&c.handle(Event::Hardware(HardwareEvent::new(
            OverlayKind::Brightness,
            0.4,
        ))));
        assert_eq!(req.after, Duration::from_millis(1500));
    }

    #[test]
    fn download_dismisses_after_two_seconds() {
        let mut c = coordinator(Preferences::default());
        settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        let id = binding_on(&c, "eDP-1");
        let req = only_timer(&c.handle(Event::Hardware(
            HardwareEvent::new(OverlayKind::Download, 0.5).with_duration(Duration::from_secs(10)),
        )));
        assert_eq!(req.after, DOWNLOAD_DURATION);
        assert!(c.expanding_item_for(id).is_some());
        c.handle(Event::TimerFired(req.token));
        assert!(c.expanding_item_for(id).is_none());
    }

    #[test]
    fn suppressed_mic_still_persists_mirror() {
        let mut c = coordinator(Preferences {
            hud_replacement: false,
            ..Preferences::default()
        });
        let effects = c.handle(Event::Hardware(HardwareEvent::new(OverlayKind::Mic, 1.0)));
        assert_eq!(effects, vec![Effect::PersistMicMuted(true)]);
        assert!(c.mic_muted());
    }

    #[test]
    fn overlay_projected_on_selected_display_only() {
        let mut c = coordinator(Preferences {
            show_on_all_displays: true,
            selected_display: Some("DP-1".into()),
            ..Preferences::default()
        });
        settle(&mut c, topology(&[display("eDP-1", 0.0), display("DP-1", 1920.0)]));
        c.handle(Event::Hardware(HardwareEvent::new(OverlayKind::Volume, 0.5)));
        assert!(c.sneak_peek_for(binding_on(&c, "DP-1")).is_some());
        assert!(c.sneak_peek_for(binding_on(&c, "eDP-1")).is_none());
    }

    #[test]
    fn hide_shortcut_clears_overlay() {
        let mut c = coordinator(Preferences::default());
        settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        let id = binding_on(&c, "eDP-1");
        let req = only_timer(&c.handle(Event::Hardware(HardwareEvent::new(OverlayKind::Volume, 0.5))));
        c.handle(Event::Shortcut(Shortcut::Hide(OverlayVariant::SneakPeek)));
        assert!(c.sneak_peek_for(id).is_none());
        // Re-show, then the cancelled dismissal lands: still visible.
        c.handle(Event::Hardware(HardwareEvent::new(OverlayKind::Volume, 0.7)));
        c.handle(Event::TimerFired(req.token));
        assert!(c.sneak_peek_for(id).is_some());
    }

    #[test]
    fn hover_opens_and_leave_closes() {
        let mut c = coordinator(Preferences::default());
        settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        let id = binding_on(&c, "eDP-1");

        let hover = only_timer(&c.handle(Event::Pointer {
            binding: id,
            inside: true,
        }));
        assert_eq!(hover.after, Duration::from_millis(250));
        let open = only_timer(&c.handle(Event::TimerFired(hover.token)));
        c.handle(Event::TimerFired(open.token));
        assert_eq!(c.surface(id).unwrap().phase, Phase::Open);

        let leave = only_timer(&c.handle(Event::Pointer {
            binding: id,
            inside: false,
        }));
        assert_eq!(leave.after, Duration::from_secs(3));
        // Coming back cancels the pending close.
        c.handle(Event::Pointer {
            binding: id,
            inside: true,
        });
        assert!(c.handle(Event::TimerFired(leave.token)).is_empty());
        assert_eq!(c.surface(id).unwrap().phase, Phase::Open);

        let leave = only_timer(&c.handle(Event::Pointer {
            binding: id,
            inside: false,
        }));
        let close = only_timer(&c.handle(Event::TimerFired(leave.token)));
        c.handle(Event::TimerFired(close.token));
        assert_eq!(c.surface(id).unwrap().phase, Phase::Closed);
    }

    #[test]
    fn quick_pass_does_not_open() {
        let mut c = coordinator(Preferences::default());
        settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        let id = binding_on(&c, "eDP-1");
        let hover = only_timer(&c.handle(Event::Pointer {
            binding: id,
            inside: true,
        }));
        c.handle(Event::Pointer {
            binding: id,
            inside: false,
        });
        assert!(c.handle(Event::TimerFired(hover.token)).is_empty());
        assert_eq!(c.surface(id).unwrap().phase, Phase::Closed);
    }

    #[test]
    fn preference_change_is_debounced_and_applied() {
        let mut c = coordinator(Preferences::default());
        settle(&mut c, topology(&[display("eDP-1", 0.0), display("DP-1", 1920.0)]));
        assert_eq!(c.bindings().count(), 1);

        let req = only_timer(&c.handle(Event::PreferencesChanged(Preferences {
            show_on_all_displays: true,
            hud_replacement: false,
            ..Preferences::default()
        })));
        assert_eq!(req.after, DEBOUNCE);
        assert_eq!(c.bindings().count(), 1);

        let effects = c.handle(Event::TimerFired(req.token));
        assert!(effects.iter().any(|e| matches!(e, Effect::CreateSurface { .. })));
        assert_eq!(c.bindings().count(), 2);
        assert!(!c.preferences().hud_replacement);
        assert!(timers(&c.handle(Event::Hardware(HardwareEvent::new(OverlayKind::Volume, 0.5)))).is_empty());
    }

    #[test]
    fn vanished_selection_is_persisted() {
        let mut c = coordinator(Preferences {
            selected_display: Some("DP-1".into()),
            ..Preferences::default()
        });
        settle(&mut c, topology(&[display("eDP-1", 0.0), display("DP-1", 1920.0)]));
        let effects = settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        let fallback = DisplayName::new("eDP-1");
        assert!(effects.contains(&Effect::SelectionChanged(fallback.clone())));
        assert!(effects.contains(&Effect::PersistSelectedDisplay(fallback)));
        assert_eq!(c.preferences().selected_display.as_deref(), Some("eDP-1"));
    }

    /// Feed the current preferences back as if the file watcher had reloaded
    /// them after a save.
    fn reload(c: &mut Coordinator) -> Vec<Effect> {
        let prefs = c.preferences().clone();
        match c.handle(Event::PreferencesChanged(prefs)).as_slice() {
            [Effect::Schedule(req)] => c.handle(Event::TimerFired(req.token)),
            other => other.to_vec(),
        }
    }

    fn persists(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::PersistSelectedDisplay(_)))
            .count()
    }

    #[test]
    fn missing_override_display_is_never_persisted() {
        let mut c = coordinator(Preferences::default()).with_screen_override(Some("HDMI-9".into()));
        let mut effects = settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        assert!(effects.contains(&Effect::SelectionChanged(DisplayName::new("eDP-1"))));
        for _ in 0..3 {
            effects.extend(reload(&mut c));
        }
        assert_eq!(persists(&effects), 0);
        assert_eq!(c.preferences().selected_display, None);
        assert!(c.bindings().any(|b| b.display().name.as_str() == "eDP-1"));
    }

    #[test]
    fn override_outranks_preferred_display() {
        let mut c = coordinator(Preferences {
            selected_display: Some("eDP-1".into()),
            ..Preferences::default()
        })
        .with_screen_override(Some("DP-1".into()));
        settle(&mut c, topology(&[display("eDP-1", 0.0), display("DP-1", 1920.0)]));
        assert_eq!(c.overlay_target(), Some(binding_on(&c, "DP-1")));
        assert_eq!(c.preferences().selected_display.as_deref(), Some("eDP-1"));
    }

    #[test]
    fn fallback_persists_once_across_reloads() {
        let mut c = coordinator(Preferences {
            selected_display: Some("HDMI-9".into()),
            ..Preferences::default()
        });
        let mut effects = settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        for _ in 0..3 {
            effects.extend(reload(&mut c));
        }
        assert_eq!(persists(&effects), 1);
    }

    #[test]
    fn single_mode_second_display_changes_nothing() {
        let mut c = coordinator(Preferences::default());
        let a = display("eDP-1", 0.0);
        settle(&mut c, topology(&[a.clone()]));
        let id = binding_on(&c, "eDP-1");
        let effects = settle(&mut c, topology(&[a, display("DP-1", 1920.0)]));
        assert!(effects.is_empty());
        assert_eq!(binding_on(&c, "eDP-1"), id);
    }

    fn track(title: &str) -> TrackInfo {
        TrackInfo {
            title: title.into(),
            artist: "Artist".into(),
            playing: true,
        }
    }

    fn query_ticket(effects: &[Effect]) -> QueryTicket {
        effects
            .iter()
            .find_map(|e| match e {
                Effect::QueryNowPlaying(t) => Some(*t),
                _ => None,
            })
            .unwrap()
    }

    #[test]
    fn track_change_shows_music_peek() {
        let mut c = coordinator(Preferences {
            hud_replacement: false,
            ..Preferences::default()
        });
        settle(&mut c, topology(&[display("eDP-1", 0.0)]));
        let id = binding_on(&c, "eDP-1");
        let ticket = query_ticket(&c.start());
        let effects = c.handle(Event::NowPlaying {
            ticket,
            track: Some(track("Intro")),
        });
        assert_eq!(timers(&effects).len(), 1);
        let peek = c.sneak_peek_for(id).unwrap();
        assert_eq!(peek.kind, OverlayKind::Music);
        assert_eq!(peek.label.as_deref(), Some("Artist - Intro"));
        assert_eq!(c.now_playing().map(|t| t.title.as_str()), Some("Intro"));
    }

    #[test]
    fn superseded_query_result_discarded() {
        let mut c = coordinator(Preferences::default());
        let start = c.start();
        let stale = query_ticket(&start);
        let poll = timers(&start)[0];
        let fresh = query_ticket(&c.handle(Event::TimerFired(poll.token)));

        assert!(c
            .handle(Event::NowPlaying {
                ticket: stale,
                track: Some(track("Old")),
            })
            .is_empty());
        assert!(c.now_playing().is_none());

        c.handle(Event::NowPlaying {
            ticket: fresh,
            track: Some(track("New")),
        });
        assert_eq!(c.now_playing().map(|t| t.title.as_str()), Some("New"));
    }

    #[test]
    fn same_track_does_not_reshow() {
        let mut c = coordinator(Preferences::default());
        let start = c.start();
        c.handle(Event::NowPlaying {
            ticket: query_ticket(&start),
            track: Some(track("Loop")),
        });
        let poll = timers(&start)[0];
        let next = c.handle(Event::TimerFired(poll.token));
        let effects = c.handle(Event::NowPlaying {
            ticket: query_ticket(&next),
            track: Some(track("Loop")),
        });
        assert!(effects.is_empty());
    }

    #[test]
    fn shutdown_tears_down_and_ignores_later_events() {
        let mut c = coordinator(all_displays());
        settle(&mut c, topology(&[display("eDP-1", 0.0), display("DP-1", 1920.0)]));
        let ticket = query_ticket(&c.start());
        let peek = only_timer(&c.handle(Event::Hardware(HardwareEvent::new(OverlayKind::Volume, 0.5))));
        let pending = only_timer(&c.handle(Event::Topology(topology(&[]))));

        let effects = c.handle(Event::Shutdown);
        let destroyed = effects
            .iter()
            .filter(|e| matches!(e, Effect::DestroySurface { .. }))
            .count();
        assert_eq!(destroyed, 2);
        assert!(c.is_shut_down());
        assert!(c.shutdown().is_empty());

        assert!(c.handle(Event::TimerFired(peek.token)).is_empty());
        assert!(c.handle(Event::TimerFired(pending.token)).is_empty());
        assert!(c
            .handle(Event::NowPlaying {
                ticket,
                track: Some(track("Late")),
            })
            .is_empty());
        assert!(c.now_playing().is_none());
        assert_eq!(c.bindings().count(), 0);
        assert!(c.start().is_empty());
    }
}
