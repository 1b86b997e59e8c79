//! Display topology from the compositor's randr tool.

use std::process::Command;
use std::time::Duration;

use crate::display::{Display, DisplayName, Topology};
use crate::events::{Event, EventSender};
use crate::geometry::Rect;
use crate::util;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Query available Wayland outputs. Tries wlr-randr first, then cosmic-randr.
pub fn enumerate_displays() -> Topology {
    let result = Command::new("wlr-randr")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .or_else(|| {
            Command::new("cosmic-randr")
                .arg("list")
                .output()
                .ok()
                .filter(|o| o.status.success())
        });
    match result {
        Some(o) => parse_randr(&String::from_utf8_lossy(&o.stdout)),
        None => Topology::default(),
    }
}

#[derive(Default)]
struct OutputBlock {
    name: String,
    enabled: bool,
    mode: Option<(f32, f32)>,
    position: (f32, f32),
    scale: f32,
}

impl OutputBlock {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            scale: 1.0,
            ..Default::default()
        }
    }

    fn into_display(self) -> Option<Display> {
        if !self.enabled {
            return None;
        }
        let (w, h) = self.mode.unwrap_or((0.0, 0.0));
        let scale = if self.scale > 0.0 { self.scale } else { 1.0 };
        Some(Display::new(
            self.name,
            Rect::new(
                self.position.0,
                self.position.1,
                (w / scale).round(),
                (h / scale).round(),
            ),
        ))
    }
}

fn parse_mode(line: &str) -> Option<(f32, f32)> {
    let dims = line.split_whitespace().next()?;
    let (w, h) = dims.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Parse `wlr-randr` style output: an unindented header per output followed
/// by indented `Key: value` lines. Outputs with `Enabled: no` are skipped.
/// The output at the origin is primary, otherwise the first one.
pub fn parse_randr(stdout: &str) -> Topology {
    let mut blocks: Vec<OutputBlock> = Vec::new();
    for raw in stdout.lines() {
        let line = util::strip_ansi(raw);
        if line.trim().is_empty() {
            continue;
        }
        if !line.starts_with(' ') && !line.starts_with('\t') {
            if let Some(name) = line.split_whitespace().next() {
                blocks.push(OutputBlock::new(name));
            }
            continue;
        }
        let Some(block) = blocks.last_mut() else {
            continue;
        };
        let field = line.trim();
        if let Some(rest) = field.strip_prefix("Enabled:") {
            block.enabled = rest.trim() == "yes";
        } else if let Some(rest) = field.strip_prefix("Position:") {
            if let Some((x, y)) = rest.trim().split_once(',') {
                block.position = (
                    x.trim().parse().unwrap_or(0.0),
                    y.trim().parse().unwrap_or(0.0),
                );
            }
        } else if let Some(rest) = field.strip_prefix("Scale:") {
            block.scale = rest.trim().parse().unwrap_or(1.0);
        } else if field.contains("current") && field.contains(" px") {
            block.mode = parse_mode(field);
        }
    }

    let displays: Vec<Display> = blocks
        .into_iter()
        .filter_map(OutputBlock::into_display)
        .collect();
    let primary = displays
        .iter()
        .find(|d| d.frame.x == 0.0 && d.frame.y == 0.0)
        .or_else(|| displays.first())
        .map(|d| d.name.clone());
    Topology { displays, primary }
}

/// Poll the topology and publish it whenever it changes. Runs until the bus
/// is dropped.
pub fn watch_topology(tx: EventSender) {
    let mut last: Option<Topology> = None;
    loop {
        let topology = enumerate_displays();
        if last.as_ref() != Some(&topology) {
            let names: Vec<&str> = topology.displays.iter().map(|d| d.name.as_str()).collect();
            tracing::debug!(
                "topology: {names:?} (primary {:?})",
                topology.primary.as_ref().map(DisplayName::as_str)
            );
            if !tx.send(Event::Topology(topology.clone())) {
                return;
            }
            last = Some(topology);
        }
        std::thread::sleep(POLL_INTERVAL);
    }
}
