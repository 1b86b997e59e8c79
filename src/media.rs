//! Media player plumbing: transport commands and now-playing queries, both
//! backed by `playerctl`.

use std::fmt;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

use futures::channel::oneshot;
use futures::future::BoxFuture;

use crate::error::TransportError;

const PLAYERCTL: &str = "playerctl";

/// Closed set of transport commands. Indexes the executor's retry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaCommand {
    PlayPause,
    Next,
    Previous,
    /// Parameter: offset in seconds (negative seeks back).
    Seek,
    ToggleShuffle,
    ToggleRepeat,
    /// Parameter: volume fraction in `0.0..=1.0`.
    SetVolume,
}

impl MediaCommand {
    pub const COUNT: usize = 7;

    #[cfg(test)]
    pub const ALL: [MediaCommand; Self::COUNT] = [
        MediaCommand::PlayPause,
        MediaCommand::Next,
        MediaCommand::Previous,
        MediaCommand::Seek,
        MediaCommand::ToggleShuffle,
        MediaCommand::ToggleRepeat,
        MediaCommand::SetVolume,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "play-pause" | "toggle" => Some(MediaCommand::PlayPause),
            "next" => Some(MediaCommand::Next),
            "previous" | "prev" => Some(MediaCommand::Previous),
            "seek" => Some(MediaCommand::Seek),
            "shuffle" => Some(MediaCommand::ToggleShuffle),
            "repeat" | "loop" => Some(MediaCommand::ToggleRepeat),
            "volume" => Some(MediaCommand::SetVolume),
            _ => None,
        }
    }

    /// `playerctl` arguments for this command.
    pub fn playerctl_args(self, parameter: Option<f64>) -> Vec<String> {
        match self {
            MediaCommand::PlayPause => vec!["play-pause".into()],
            MediaCommand::Next => vec!["next".into()],
            MediaCommand::Previous => vec!["previous".into()],
            MediaCommand::Seek => {
                let secs = parameter.unwrap_or(0.0);
                let sign = if secs < 0.0 { '-' } else { '+' };
                vec!["position".into(), format!("{}{sign}", secs.abs())]
            }
            MediaCommand::ToggleShuffle => vec!["shuffle".into(), "Toggle".into()],
            MediaCommand::ToggleRepeat => vec!["loop".into(), cycle_loop_status()],
            MediaCommand::SetVolume => {
                let level = parameter.unwrap_or(0.5).clamp(0.0, 1.0);
                vec!["volume".into(), format!("{level}")]
            }
        }
    }
}

impl fmt::Display for MediaCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaCommand::PlayPause => "play-pause",
            MediaCommand::Next => "next",
            MediaCommand::Previous => "previous",
            MediaCommand::Seek => "seek",
            MediaCommand::ToggleShuffle => "shuffle",
            MediaCommand::ToggleRepeat => "repeat",
            MediaCommand::SetVolume => "volume",
        };
        f.write_str(name)
    }
}

/// Next `playerctl loop` status: None -> Playlist -> Track -> None.
fn cycle_loop_status() -> String {
    let current = Command::new(PLAYERCTL)
        .arg("loop")
        .stderr(Stdio::null())
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();
    match current.as_str() {
        "None" => "Playlist",
        "Playlist" => "Track",
        _ => "None",
    }
    .to_string()
}

/// Sends transport commands to whatever is playing.
pub trait MediaTransport: Send + Sync {
    /// `false` when the backing player control is missing entirely.
    fn is_available(&self) -> bool;

    fn send_command(
        &self,
        kind: MediaCommand,
        parameter: Option<f64>,
    ) -> BoxFuture<'static, Result<(), TransportError>>;
}

/// Run a blocking closure on its own thread and await the result.
pub(crate) async fn off_thread<T, F>(f: F) -> Option<T>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    std::thread::spawn(move || {
        let _ = tx.send(f());
    });
    rx.await.ok()
}

/// Sends commands through `playerctl`. Whether the binary exists is probed
/// once, on first use.
#[derive(Debug, Default)]
pub struct PlayerctlTransport {
    available: OnceLock<bool>,
}

impl PlayerctlTransport {
    fn probe() -> bool {
        let found = Command::new(PLAYERCTL)
            .arg("--version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .is_ok_and(|s| s.success());
        if !found {
            tracing::warn!("{PLAYERCTL} not found; media controls disabled");
        }
        found
    }

    fn run(args: Vec<String>) -> Result<(), TransportError> {
        let status = Command::new(PLAYERCTL)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => TransportError::Unavailable(PLAYERCTL.into()),
                _ => TransportError::Io(e.to_string()),
            })?;
        if status.success() {
            Ok(())
        } else {
            Err(TransportError::Failed {
                program: format!("{PLAYERCTL} {}", args.join(" ")),
                status: status.to_string(),
            })
        }
    }
}

impl MediaTransport for PlayerctlTransport {
    fn is_available(&self) -> bool {
        *self.available.get_or_init(Self::probe)
    }

    fn send_command(
        &self,
        kind: MediaCommand,
        parameter: Option<f64>,
    ) -> BoxFuture<'static, Result<(), TransportError>> {
        Box::pin(async move {
            off_thread(move || Self::run(kind.playerctl_args(parameter)))
                .await
                .unwrap_or_else(|| Err(TransportError::Io("transport thread vanished".into())))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub title: String,
    pub artist: String,
    pub playing: bool,
}

impl TrackInfo {
    /// Parse `playerctl metadata --format '{{status}}\t{{artist}}\t{{title}}'`.
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.trim_end_matches('\n').splitn(3, '\t');
        let status = parts.next()?;
        let artist = parts.next()?.trim();
        let title = parts.next()?.trim();
        if title.is_empty() {
            return None;
        }
        Some(Self {
            title: title.to_string(),
            artist: artist.to_string(),
            playing: status == "Playing",
        })
    }

    pub fn display_label(&self) -> String {
        if self.artist.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artist, self.title)
        }
    }
}

/// Fetch the current track. `None` when nothing is playing or playerctl is
/// missing.
pub async fn query_now_playing() -> Option<TrackInfo> {
    off_thread(|| {
        let output = Command::new(PLAYERCTL)
            .args([
                "metadata",
                "--format",
                "{{status}}\t{{artist}}\t{{title}}",
            ])
            .stderr(Stdio::null())
            .output()
            .ok()
            .filter(|o| o.status.success())?;
        TrackInfo::parse(&String::from_utf8_lossy(&output.stdout))
    })
    .await
    .flatten()
}

/// Identifies one outstanding background query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryTicket(u64);

/// Hands out tickets for background queries. Only the newest ticket's result
/// is accepted; starting a new query or cancelling voids older tickets.
#[derive(Debug, Default)]
pub struct QueryGate {
    issued: u64,
    outstanding: Option<u64>,
}

impl QueryGate {
    pub fn begin(&mut self) -> QueryTicket {
        self.issued += 1;
        self.outstanding = Some(self.issued);
        QueryTicket(self.issued)
    }

    pub fn cancel(&mut self) {
        self.outstanding = None;
    }

    #[allow(dead_code)]
    pub fn is_pending(&self) -> bool {
        self.outstanding.is_some()
    }

    /// Consume `ticket`'s result if it is still wanted.
    pub fn accept(&mut self, ticket: QueryTicket) -> bool {
        if self.outstanding == Some(ticket.0) {
            self.outstanding = None;
            true
        } else {
            false
        }
    }
}
