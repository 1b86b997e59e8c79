use iced::widget::text::Shaping;
use iced::widget::{column, container, mouse_area, row, space, text};
use iced::{Alignment, Color, Element, Length, mouse};

use crate::app::{Message, NotchHud};
use crate::display::BindingId;
use crate::events::{Event, OverlayKind};
use crate::media::MediaCommand;
use crate::notch::{NotchView, Phase};
use crate::theme::NOTCH_FONT;
use crate::util::{level_bar, truncate_str};

/// Extra width on each side of the closed notch while an expanding item shows.
const EXPANDED_WING: f32 = 64.0;
const CORNER_RADIUS: f32 = 14.0;
const LEVEL_CELLS: usize = 8;
const PEEK_LABEL_CHARS: usize = 18;
const TRACK_CHARS: usize = 48;

impl NotchHud {
    pub(crate) fn view_notch(&self, binding: BindingId) -> Element<'_, Message> {
        let Some(snapshot) = self.coordinator.surface(binding) else {
            return space::Space::new().width(0).height(0).into();
        };
        let opened = matches!(snapshot.phase, Phase::Opening | Phase::Open);

        let mut size = snapshot.target_size;
        if !opened && self.coordinator.expanding_item_for(binding).is_some() {
            size.width += 2.0 * EXPANDED_WING;
        }

        // Content follows the settled phase; mid-transition only the frame moves.
        let body = match snapshot.phase {
            Phase::Open => self.open_body(snapshot.view),
            Phase::Closed => self.closed_body(binding),
            Phase::Opening | Phase::Closing => space::Space::new().width(0).height(0).into(),
        };

        let notch = container(body)
            .width(size.width)
            .height(size.height)
            .padding([6, 14])
            .style(self.colors.notch_style(CORNER_RADIUS));

        let hover = mouse_area(notch)
            .on_enter(Message::Bus(Event::Pointer {
                binding,
                inside: true,
            }))
            .on_exit(Message::Bus(Event::Pointer {
                binding,
                inside: false,
            }));

        container(hover)
            .center_x(Length::Fill)
            .align_top(Length::Fill)
            .into()
    }

    fn closed_body(&self, binding: BindingId) -> Element<'_, Message> {
        let colors = &self.colors;
        let glyph = |s: String, color: Color| {
            text(s)
                .size(colors.peek_text)
                .color(color)
                .font(NOTCH_FONT)
                .shaping(Shaping::Advanced)
        };

        if let Some(item) = self.coordinator.expanding_item_for(binding) {
            return row![
                glyph(item.kind.default_icon().to_string(), colors.accent),
                space::horizontal(),
                glyph(format!("{:.0}%", item.value * 100.0), colors.text),
            ]
            .align_y(Alignment::Center)
            .into();
        }

        if let Some(peek) = self.coordinator.sneak_peek_for(binding) {
            let muted_mic = peek.kind == OverlayKind::Mic && peek.value >= 0.5;
            let icon_color = if muted_mic { colors.alert } else { colors.text };
            let detail = match (&peek.label, peek.kind) {
                (Some(label), _) => truncate_str(label, PEEK_LABEL_CHARS),
                (None, OverlayKind::Mic) => {
                    if muted_mic { "muted" } else { "live" }.to_string()
                }
                (None, _) => level_bar(peek.value, LEVEL_CELLS),
            };
            return row![
                glyph(peek.icon.clone(), icon_color),
                space::horizontal(),
                glyph(detail, colors.muted),
            ]
            .align_y(Alignment::Center)
            .into();
        }

        if self.coordinator.mic_muted() {
            // nf-fa-microphone_slash
            return row![space::horizontal(), glyph("\u{f131}".to_string(), colors.alert)].into();
        }
        space::Space::new().width(0).height(0).into()
    }

    fn open_body(&self, view: NotchView) -> Element<'_, Message> {
        let colors = &self.colors;
        let tab = |label: &'static str, this: NotchView| {
            text(label)
                .size(colors.title_text)
                .color(if view == this { colors.accent } else { colors.muted })
                .font(NOTCH_FONT)
        };
        let tabs = row![tab("Home", NotchView::Home), tab("Shelf", NotchView::Shelf)].spacing(12);

        let content: Element<'_, Message> = match view {
            NotchView::Home => self.now_playing_panel(),
            NotchView::Shelf => text("Shelf is empty")
                .size(colors.body_text)
                .color(colors.muted)
                .into(),
        };

        column![tabs, content]
            .spacing(10)
            .width(Length::Fill)
            .into()
    }

    fn now_playing_panel(&self) -> Element<'_, Message> {
        let colors = &self.colors;
        let title = match self.coordinator.now_playing() {
            Some(track) => truncate_str(&track.display_label(), TRACK_CHARS),
            None => "Nothing playing".to_string(),
        };
        let playing = self.coordinator.now_playing().is_some_and(|t| t.playing);

        let control = |glyph: &'static str, kind: MediaCommand| {
            // Pending commands are dimmed until they settle.
            let color = if self.executor.is_in_flight(kind) {
                colors.muted
            } else {
                colors.text
            };
            mouse_area(
                text(glyph)
                    .size(colors.title_text)
                    .color(color)
                    .font(NOTCH_FONT)
                    .shaping(Shaping::Advanced),
            )
            .on_press(Message::Media(kind, None))
            .interaction(mouse::Interaction::Pointer)
        };

        column![
            text(title)
                .size(colors.body_text)
                .color(colors.text)
                .font(NOTCH_FONT)
                .shaping(Shaping::Advanced),
            row![
                control("\u{f048}", MediaCommand::Previous),
                control(if playing { "\u{f04c}" } else { "\u{f04b}" }, MediaCommand::PlayPause),
                control("\u{f051}", MediaCommand::Next),
                control("\u{f074}", MediaCommand::ToggleShuffle),
                control("\u{f01e}", MediaCommand::ToggleRepeat),
            ]
            .spacing(18),
        ]
        .spacing(8)
        .into()
    }
}
