/// Logical size in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned rectangle in the compositor's logical coordinate space
/// (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// Collapsed notch geometry.
pub const CLOSED_SIZE: Size = Size::new(185.0, 32.0);

/// Expanded notch geometry.
pub const OPEN_SIZE: Size = Size::new(640.0, 190.0);

/// Where the notch surface sits on a display: centered on the top edge and
/// large enough to hold the expanded notch. A display narrower than the open
/// notch gets a surface clamped to its width.
pub fn notch_placement(display: &Rect) -> Rect {
    let width = OPEN_SIZE.width.min(display.width.max(0.0));
    let height = OPEN_SIZE.height.min(display.height.max(0.0));
    let x = display.x + (display.width - width) / 2.0;
    Rect::new(x, display.y, width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placement_centered_on_top_edge() {
        let display = Rect::new(0.0, 0.0, 1920.0, 1080.0);
        let placement = notch_placement(&display);
        assert_eq!(placement.x, 640.0);
        assert_eq!(placement.y, 0.0);
        assert_eq!(placement.size(), OPEN_SIZE);
    }

    #[test]
    fn placement_follows_display_offset() {
        let display = Rect::new(1920.0, 0.0, 2560.0, 1440.0);
        let placement = notch_placement(&display);
        assert_eq!(placement.x, 1920.0 + 960.0);
    }

    #[test]
    fn placement_clamped_to_tiny_display() {
        let display = Rect::new(0.0, 0.0, 320.0, 100.0);
        let placement = notch_placement(&display);
        assert_eq!(placement.width, 320.0);
        assert_eq!(placement.height, 100.0);
        assert_eq!(placement.x, 0.0);
    }
}
