use iced::{Background, Color, Font};

/// Nerd Font looked up by family name; falls back to the system monospace
/// when it isn't installed.
pub const fn nerd_font(name: &'static str) -> Font {
    Font {
        family: iced::font::Family::Name(name),
        weight: iced::font::Weight::Normal,
        stretch: iced::font::Stretch::Normal,
        style: iced::font::Style::Normal,
    }
}

pub const NOTCH_FONT: Font = nerd_font("JetBrainsMono Nerd Font");

/// Colors and font sizes for the notch. The notch always blends into the
/// bezel, so there is only a dark palette.
pub struct NotchColors {
    pub notch_bg: Color,
    pub text: Color,
    pub muted: Color,
    pub accent: Color,
    /// Mic indicator when muted.
    pub alert: Color,
    pub peek_text: f32,
    pub body_text: f32,
    pub title_text: f32,
}

impl NotchColors {
    pub fn dark() -> Self {
        Self {
            notch_bg: Color::BLACK,
            text: Color {
                r: 1.0,
                g: 1.0,
                b: 1.0,
                a: 0.9,
            },
            muted: Color {
                r: 1.0,
                g: 1.0,
                b: 1.0,
                a: 0.45,
            },
            accent: Color {
                r: 1.0,
                g: 0.78,
                b: 0.0,
                a: 1.0,
            },
            alert: Color {
                r: 0.9,
                g: 0.2,
                b: 0.2,
                a: 1.0,
            },
            peek_text: 12.0,
            body_text: 13.0,
            title_text: 15.0,
        }
    }

    /// Black body with rounded bottom corners only, flush against the top
    /// edge.
    pub fn notch_style(&self, radius: f32) -> impl Fn(&iced::Theme) -> iced::widget::container::Style {
        let color = self.notch_bg;
        move |_theme: &iced::Theme| iced::widget::container::Style {
            background: Some(Background::Color(color)),
            border: iced::Border {
                radius: iced::border::Radius {
                    top_left: 0.0,
                    top_right: 0.0,
                    bottom_right: radius,
                    bottom_left: radius,
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }
}
