use iced_layershell::reexport::{
    Anchor, KeyboardInteractivity, Layer, NewLayerShellSettings, OutputOption,
};

use crate::display::DisplayName;
use crate::geometry::{OPEN_SIZE, Rect};

/// Layer-shell settings for one notch window. The window is sized to the open
/// notch so the closed-to-open animation happens inside it; the compositor
/// centres a top-anchored surface that isn't stretched horizontally.
pub(crate) fn notch_settings(display: &DisplayName, placement: Rect) -> NewLayerShellSettings {
    let width = placement.width.max(OPEN_SIZE.width).round() as u32;
    let height = placement.height.max(OPEN_SIZE.height).round() as u32;
    NewLayerShellSettings {
        layer: Layer::Overlay,
        anchor: Anchor::Top,
        keyboard_interactivity: KeyboardInteractivity::None,
        exclusive_zone: Some(-1),
        size: Some((width, height)),
        events_transparent: false,
        output_option: OutputOption::OutputName(display.as_str().to_string()),
        ..Default::default()
    }
}
