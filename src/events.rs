use std::time::Duration;

use futures::channel::mpsc;

use crate::config::Preferences;
use crate::display::{BindingId, DisplayName, Topology};
use crate::media::{QueryTicket, TrackInfo};
use crate::notch::NotchView;
use crate::timer::TimerToken;

/// Status categories reported by hardware and media sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayKind {
    Volume,
    Brightness,
    Mic,
    Battery,
    Music,
    Download,
    Notification,
}

/// The two ephemeral overlay slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OverlayVariant {
    /// Short indicator shown inside the closed notch.
    SneakPeek,
    /// The closed notch widens to show progress.
    ExpandingItem,
}

impl OverlayKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "volume" | "vol" => Some(OverlayKind::Volume),
            "brightness" | "backlight" => Some(OverlayKind::Brightness),
            "mic" | "microphone" => Some(OverlayKind::Mic),
            "battery" | "power" => Some(OverlayKind::Battery),
            "music" | "media" => Some(OverlayKind::Music),
            "download" => Some(OverlayKind::Download),
            "notification" | "notify" => Some(OverlayKind::Notification),
            _ => None,
        }
    }

    /// Which overlay slot this kind is shown in.
    pub fn variant(self) -> OverlayVariant {
        match self {
            OverlayKind::Battery | OverlayKind::Download => OverlayVariant::ExpandingItem,
            OverlayKind::Volume
            | OverlayKind::Brightness
            | OverlayKind::Mic
            | OverlayKind::Music
            | OverlayKind::Notification => OverlayVariant::SneakPeek,
        }
    }

    /// Nerd Font glyph used when the source does not supply an icon.
    pub fn default_icon(self) -> &'static str {
        match self {
            OverlayKind::Volume => "\u{f028}",       // nf-fa-volume_up
            OverlayKind::Brightness => "\u{f185}",   // nf-fa-sun_o
            OverlayKind::Mic => "\u{f130}",          // nf-fa-microphone
            OverlayKind::Battery => "\u{f240}",      // nf-fa-battery_full
            OverlayKind::Music => "\u{f001}",        // nf-fa-music
            OverlayKind::Download => "\u{f019}",     // nf-fa-download
            OverlayKind::Notification => "\u{f0f3}", // nf-fa-bell
        }
    }
}

/// A raw status report `{kind, value, icon?}` from a hardware or media source.
#[derive(Debug, Clone, PartialEq)]
pub struct HardwareEvent {
    pub kind: OverlayKind,
    /// Level in `0.0..=1.0`. For the mic, `1.0` means muted.
    pub value: f32,
    pub icon: Option<String>,
    pub label: Option<String>,
    /// `None` uses the auto-hide wait interval.
    pub duration: Option<Duration>,
}

impl HardwareEvent {
    pub fn new(kind: OverlayKind, value: f32) -> Self {
        Self {
            kind,
            value,
            icon: None,
            label: None,
            duration: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// User-triggered actions (keyboard shortcuts, control socket).
#[derive(Debug, Clone, PartialEq)]
pub enum Shortcut {
    /// `None` targets the selected display.
    Open(Option<DisplayName>),
    Close(Option<DisplayName>),
    Toggle(Option<DisplayName>),
    ShowView(NotchView),
    Hide(OverlayVariant),
}

/// Everything the coordinator reacts to.
#[derive(Debug, Clone)]
pub enum Event {
    Topology(Topology),
    PreferencesChanged(Preferences),
    Hardware(HardwareEvent),
    Shortcut(Shortcut),
    Pointer { binding: BindingId, inside: bool },
    TimerFired(TimerToken),
    NowPlaying {
        ticket: QueryTicket,
        track: Option<TrackInfo>,
    },
    Shutdown,
}

/// Producer half of the event bus. Cheap to clone; each background source
/// owns one and stops once the receiving side is gone.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<Event>,
}

impl EventSender {
    /// Returns `false` once the bus has been dropped.
    pub fn send(&self, event: Event) -> bool {
        self.tx.unbounded_send(event).is_ok()
    }
}

pub fn bus() -> (EventSender, mpsc::UnboundedReceiver<Event>) {
    let (tx, rx) = mpsc::unbounded();
    (EventSender { tx }, rx)
}
