use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::events::{Event, EventSender};

/// Preference file mtime poll interval.
const WATCH_INTERVAL: Duration = Duration::from_secs(2);

/// User preferences, read from `preferences.json`. Missing fields take their
/// defaults so older files keep loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Replacement mode. When off, only music overlays are shown.
    pub hud_replacement: bool,
    /// Display the notch lives on in single-display mode.
    pub selected_display: Option<String>,
    pub show_on_all_displays: bool,
    /// Default sneak-peek duration and pointer-leave close delay.
    pub auto_hide_wait_ms: u64,
    /// Pointer-enter open delay.
    pub hover_delay_ms: u64,
    /// Keep the last pane after closing instead of returning Home.
    pub remember_last_view: bool,
    pub debug_logging: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            hud_replacement: true,
            selected_display: None,
            show_on_all_displays: false,
            auto_hide_wait_ms: 3000,
            hover_delay_ms: 250,
            remember_last_view: false,
            debug_logging: false,
        }
    }
}

impl Preferences {
    pub fn auto_hide_wait(&self) -> Duration {
        Duration::from_millis(self.auto_hide_wait_ms)
    }

    pub fn hover_delay(&self) -> Duration {
        Duration::from_millis(self.hover_delay_ms)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("invalid preferences in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json(path, self)
    }
}

/// Hardware state mirrored to disk independently of what the notch shows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusMirror {
    pub mic_muted: bool,
}

impl StatusMirror {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).unwrap_or_default();
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_json(path, self)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
    Ok(())
}

pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("notch-hud")
}

pub fn preferences_path() -> PathBuf {
    config_dir().join("preferences.json")
}

pub fn status_path() -> PathBuf {
    config_dir().join("status.json")
}

/// Load preferences from the default location. A broken file falls back to
/// defaults.
pub fn load_startup_preferences() -> Preferences {
    match Preferences::load(&preferences_path()) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!("{e:#}; using default preferences");
            Preferences::default()
        }
    }
}

/// Display named by `NOTCH_HUD_SCREEN`. It outranks `selected_display` for
/// this process only and is never written back to the preference file.
pub fn screen_override() -> Option<String> {
    let name = std::env::var("NOTCH_HUD_SCREEN").ok().filter(|s| !s.is_empty())?;
    tracing::info!("target screen: {name} (from NOTCH_HUD_SCREEN)");
    Some(name)
}

fn modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Watch the preference file and publish every successfully parsed change.
/// Runs until the bus is dropped.
pub fn watch_preferences(tx: EventSender) {
    let path = preferences_path();
    let mut last_mtime = modified(&path);
    loop {
        std::thread::sleep(WATCH_INTERVAL);
        let mtime = modified(&path);
        if mtime == last_mtime {
            continue;
        }
        last_mtime = mtime;
        match Preferences::load(&path) {
            Ok(prefs) => {
                tracing::debug!("preferences changed on disk");
                if !tx.send(Event::PreferencesChanged(prefs)) {
                    return;
                }
            }
            Err(e) => tracing::warn!("{e:#}; keeping current preferences"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("notch-hud-test-{}", std::process::id()))
            .join(name)
    }

    #[test]
    fn missing_fields_take_defaults() {
        let prefs: Preferences =
            serde_json::from_str(r#"{"selected_display": "DP-1"}"#).unwrap();
        assert_eq!(prefs.selected_display.as_deref(), Some("DP-1"));
        assert!(prefs.hud_replacement);
        assert_eq!(prefs.auto_hide_wait(), Duration::from_secs(3));
        assert_eq!(prefs.hover_delay(), Duration::from_millis(250));
    }

    #[test]
    fn missing_file_is_default() {
        let prefs = Preferences::load(&scratch("does-not-exist.json")).unwrap();
        assert_eq!(prefs, Preferences::default());
    }

    #[test]
    fn invalid_file_is_an_error() {
        let path = scratch("broken.json");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();
        assert!(Preferences::load(&path).is_err());
    }

    #[test]
    fn save_then_load_preserves_selection() {
        let path = scratch("nested/preferences.json");
        let prefs = Preferences {
            selected_display: Some("HDMI-A-1".into()),
            show_on_all_displays: true,
            ..Preferences::default()
        };
        prefs.save(&path).unwrap();
        assert_eq!(Preferences::load(&path).unwrap(), prefs);
    }

    #[test]
    fn status_mirror_persists_mic() {
        let path = scratch("status.json");
        StatusMirror { mic_muted: true }.save(&path).unwrap();
        assert!(StatusMirror::load(&path).unwrap().mic_muted);
    }
}
