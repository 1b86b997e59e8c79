use std::io::BufRead;
use std::os::unix::net::UnixListener;
use std::path::PathBuf;
use std::time::Duration;

use futures::StreamExt;
use futures::channel::mpsc;

use crate::app::Message;
use crate::config;
use crate::display::{DisplayName, provider};
use crate::events::{self, Event, HardwareEvent, OverlayKind, OverlayVariant, Shortcut};
use crate::media::MediaCommand;
use crate::notch::NotchView;

pub(crate) fn socket_path() -> PathBuf {
    let runtime_dir = std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(runtime_dir).join("notch-hud.sock")
}

/// `0.4` and `40` both mean 40%. Only whole numbers are read as percent, so
/// `1.5` is a fraction and clamps to full.
fn parse_level(raw: &str) -> Option<f32> {
    if let Ok(percent) = raw.parse::<u32>() {
        return Some(if percent <= 1 {
            percent as f32
        } else {
            (percent as f32 / 100.0).min(1.0)
        });
    }
    let value: f32 = raw.parse().ok()?;
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

fn target(rest: &str) -> Option<DisplayName> {
    let rest = rest.trim();
    (!rest.is_empty()).then(|| DisplayName::new(rest))
}

fn hardware(kind: OverlayKind, args: &str) -> Option<Message> {
    let mut parts = args.split_whitespace();
    let value = parse_level(parts.next()?)?;
    let mut event = HardwareEvent::new(kind, value);
    if let Some(ms) = parts.next() {
        event = event.with_duration(Duration::from_millis(ms.parse().ok()?));
    }
    Some(Message::Bus(Event::Hardware(event)))
}

/// Translate one control-socket line. Unknown or malformed lines yield `None`.
pub(crate) fn parse_command(line: &str) -> Option<Message> {
    let line = line.trim();
    let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim();
    let shortcut = |s| Some(Message::Bus(Event::Shortcut(s)));
    match cmd {
        "open" => shortcut(Shortcut::Open(target(rest))),
        "close" => shortcut(Shortcut::Close(target(rest))),
        "toggle" => shortcut(Shortcut::Toggle(target(rest))),
        "view" => shortcut(Shortcut::ShowView(NotchView::from_name(rest)?)),
        "hide" => {
            let variant = match rest {
                "sneak-peek" | "peek" => OverlayVariant::SneakPeek,
                "expanding" | "item" => OverlayVariant::ExpandingItem,
                _ => return None,
            };
            shortcut(Shortcut::Hide(variant))
        }
        "mic" => {
            let value = match rest {
                "on" | "mute" | "muted" => 1.0,
                "off" | "unmute" | "unmuted" => 0.0,
                _ => return None,
            };
            Some(Message::Bus(Event::Hardware(HardwareEvent::new(
                OverlayKind::Mic,
                value,
            ))))
        }
        "notification" | "music" if !rest.is_empty() => {
            let kind = OverlayKind::from_name(cmd)?;
            Some(Message::Bus(Event::Hardware(
                HardwareEvent::new(kind, 1.0).with_label(rest),
            )))
        }
        "media" => {
            let mut parts = rest.split_whitespace();
            let kind = MediaCommand::from_name(parts.next()?)?;
            let param = match parts.next() {
                Some(raw) => Some(raw.parse::<f64>().ok()?),
                None => None,
            };
            Some(Message::Media(kind, param))
        }
        "media-cancel" => Some(Message::CancelMedia),
        "quit" => Some(Message::Bus(Event::Shutdown)),
        other => hardware(OverlayKind::from_name(other)?, rest),
    }
}

pub(crate) fn socket_listener() -> impl futures::Stream<Item = Message> {
    let (tx, rx) = mpsc::unbounded();
    std::thread::spawn(move || {
        let path = socket_path();
        let _ = std::fs::remove_file(&path);
        let listener = match UnixListener::bind(&path) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("failed to bind socket {path:?}: {e}");
                return;
            }
        };
        tracing::info!("listening on {path:?}");
        for stream in listener.incoming().flatten() {
            let mut buf = String::new();
            if std::io::BufReader::new(stream).read_line(&mut buf).is_err() {
                continue;
            }
            let Some(msg) = parse_command(&buf) else {
                tracing::warn!("unknown command: {:?}", buf.trim());
                continue;
            };
            if tx.unbounded_send(msg).is_err() {
                break;
            }
        }
    });
    rx
}

// --- Background producers, each on its own thread and bus ---

pub(crate) fn topology_stream() -> impl futures::Stream<Item = Message> {
    let (tx, rx) = events::bus();
    std::thread::spawn(move || provider::watch_topology(tx));
    rx.map(Message::Bus)
}

pub(crate) fn preference_stream() -> impl futures::Stream<Item = Message> {
    let (tx, rx) = events::bus();
    std::thread::spawn(move || config::watch_preferences(tx));
    rx.map(Message::Bus)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hardware_of(msg: Option<Message>) -> HardwareEvent {
        match msg {
            Some(Message::Bus(Event::Hardware(hw))) => hw,
            other => panic!("expected hardware event, got {other:?}"),
        }
    }

    #[test]
    fn level_commands() {
        let hw = hardware_of(parse_command("volume 0.4\n"));
        assert_eq!(hw.kind, OverlayKind::Volume);
        assert!((hw.value - 0.4).abs() < f32::EPSILON);
        assert_eq!(hw.duration, None);

        let hw = hardware_of(parse_command("brightness 75 1500"));
        assert!((hw.value - 0.75).abs() < 1e-6);
        assert_eq!(hw.duration, Some(Duration::from_millis(1500)));

        let hw = hardware_of(parse_command("download 0.5"));
        assert_eq!(hw.kind, OverlayKind::Download);
    }

    #[test]
    fn fractional_levels_are_never_percent() {
        assert_eq!(hardware_of(parse_command("volume 1.5")).value, 1.0);
        assert_eq!(hardware_of(parse_command("volume 1")).value, 1.0);
        assert_eq!(hardware_of(parse_command("volume 250")).value, 1.0);
        assert!((hardware_of(parse_command("volume 5")).value - 0.05).abs() < 1e-6);
        assert_eq!(hardware_of(parse_command("volume -0.3")).value, 0.0);
        assert!(parse_command("volume NaN").is_none());
    }

    #[test]
    fn mic_and_labels() {
        assert_eq!(hardware_of(parse_command("mic on")).value, 1.0);
        assert_eq!(hardware_of(parse_command("mic off")).value, 0.0);
        let hw = hardware_of(parse_command("notification Build finished"));
        assert_eq!(hw.kind, OverlayKind::Notification);
        assert_eq!(hw.label.as_deref(), Some("Build finished"));
        assert!(parse_command("music").is_none());
    }

    #[test]
    fn shortcut_commands() {
        assert!(matches!(
            parse_command("toggle"),
            Some(Message::Bus(Event::Shortcut(Shortcut::Toggle(None))))
        ));
        assert!(matches!(
            parse_command("open DP-1"),
            Some(Message::Bus(Event::Shortcut(Shortcut::Open(Some(ref n))))) if n.as_str() == "DP-1"
        ));
        assert!(matches!(
            parse_command("view shelf"),
            Some(Message::Bus(Event::Shortcut(Shortcut::ShowView(NotchView::Shelf))))
        ));
        assert!(matches!(
            parse_command("hide expanding"),
            Some(Message::Bus(Event::Shortcut(Shortcut::Hide(
                OverlayVariant::ExpandingItem
            ))))
        ));
        assert!(matches!(parse_command("quit"), Some(Message::Bus(Event::Shutdown))));
    }

    #[test]
    fn media_commands() {
        assert!(matches!(
            parse_command("media play-pause"),
            Some(Message::Media(MediaCommand::PlayPause, None))
        ));
        assert!(matches!(
            parse_command("media seek 30"),
            Some(Message::Media(MediaCommand::Seek, Some(p))) if p == 30.0
        ));
        assert!(parse_command("media seek soon").is_none());
        assert!(parse_command("media rewind").is_none());
    }

    #[test]
    fn malformed_lines_rejected() {
        assert!(parse_command("").is_none());
        assert!(parse_command("volume").is_none());
        assert!(parse_command("volume loud").is_none());
        assert!(parse_command("view settings").is_none());
        assert!(parse_command("wifi 0.2").is_none());
    }
}
