pub mod provider;
pub mod reconciler;

use std::fmt;

use crate::geometry::Rect;

pub use reconciler::{DisplayBinding, DisplayReconciler};

/// Stable output name as reported by the compositor, e.g. `eDP-1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DisplayName(String);

impl DisplayName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Process-unique identity of one display binding. Never reused, so work
/// addressed to a torn-down binding can't land on its replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for BindingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    pub name: DisplayName,
    pub frame: Rect,
}

impl Display {
    pub fn new(name: impl Into<String>, frame: Rect) -> Self {
        Self {
            name: DisplayName::new(name),
            frame,
        }
    }
}

/// Live display set as last reported by the topology provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Topology {
    pub displays: Vec<Display>,
    pub primary: Option<DisplayName>,
}

impl Topology {
    pub fn get(&self, name: &DisplayName) -> Option<&Display> {
        self.displays.iter().find(|d| &d.name == name)
    }

    /// The designated primary display, or the first live one.
    pub fn primary_display(&self) -> Option<&Display> {
        self.primary
            .as_ref()
            .and_then(|name| self.get(name))
            .or_else(|| self.displays.first())
    }
}
