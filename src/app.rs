use std::collections::BTreeMap;
use std::time::Duration;

use iced::{Color, Element, Subscription, Task};
use iced_layershell::build_pattern::daemon;
use iced_layershell::settings::{LayerShellSettings, StartMode};
use iced_layershell::to_layer_message;

use crate::command::{CommandExecutor, CommandOutcome, CommandResult};
use crate::config::{self, StatusMirror};
use crate::coordinator::{Coordinator, Effect};
use crate::display::{BindingId, DisplayName};
use crate::error::CommandError;
use crate::events::Event;
use crate::geometry::Rect;
use crate::ipc;
use crate::media::{self, MediaCommand, PlayerctlTransport};
use crate::notch::HomeAfterClose;
use crate::surface::notch_settings;
use crate::theme::NotchColors;

pub(crate) type IcedId = iced_layershell::reexport::IcedId;

pub(crate) struct NotchHud {
    pub(crate) coordinator: Coordinator,
    pub(crate) executor: CommandExecutor,
    pub(crate) colors: NotchColors,
    windows: BTreeMap<BindingId, IcedId>,
    /// Bumped on cancel so scheduled retries from before it are dropped.
    media_epoch: u64,
}

#[to_layer_message(multi)]
#[derive(Debug, Clone)]
pub(crate) enum Message {
    /// Anything the coordinator consumes.
    Bus(Event),
    Media(MediaCommand, Option<f64>),
    MediaFinished {
        kind: MediaCommand,
        parameter: Option<f64>,
        result: CommandResult,
        /// `media_epoch` when the command was dispatched.
        epoch: u64,
    },
    MediaRetry {
        kind: MediaCommand,
        parameter: Option<f64>,
        epoch: u64,
    },
    CancelMedia,
}

pub(crate) fn run() -> Result<(), iced_layershell::Error> {
    tracing::info!(
        "v{} ({}) starting in background mode",
        env!("NOTCH_HUD_VERSION"),
        env!("NOTCH_HUD_COMMIT")
    );

    let settings = LayerShellSettings {
        start_mode: StartMode::Background,
        ..Default::default()
    };

    daemon(NotchHud::new, NotchHud::namespace, NotchHud::update, NotchHud::view)
        .style(NotchHud::style)
        .subscription(NotchHud::subscription)
        .layer_settings(settings)
        .run()
}

/// Sleep off the UI thread.
async fn delay(after: Duration) {
    media::off_thread(move || std::thread::sleep(after)).await;
}

/// Delay before re-sending a failed attempt, or `None` when there is nothing
/// to retry or a cancel happened after the attempt was dispatched.
fn retry_delay(result: &CommandResult, dispatched: u64, current: u64) -> Option<Duration> {
    match result {
        Err(CommandError::AttemptFailed { retry_after, .. }) if dispatched == current => {
            Some(*retry_after)
        }
        _ => None,
    }
}

fn log_outcome(kind: MediaCommand, result: &CommandResult) {
    match result {
        Ok(CommandOutcome::Completed) => tracing::debug!("{kind}: done"),
        Ok(CommandOutcome::DuplicateSuppressed) => {}
        Err(CommandError::AttemptFailed { .. }) => tracing::debug!("{kind}: {:?}", result),
        Err(e) => tracing::warn!("{kind}: {e}"),
    }
}

impl NotchHud {
    fn new() -> (Self, Task<Message>) {
        let prefs = config::load_startup_preferences();
        let mic_muted = match StatusMirror::load(&config::status_path()) {
            Ok(status) => status.mic_muted,
            Err(e) => {
                tracing::warn!("{e:#}; assuming mic unmuted");
                false
            }
        };

        let executor = CommandExecutor::new(std::sync::Arc::new(PlayerctlTransport::default()));
        executor.on_outcome(log_outcome);

        let mut hud = Self {
            coordinator: Coordinator::new(prefs, Box::new(HomeAfterClose))
                .with_mic_muted(mic_muted)
                .with_screen_override(config::screen_override()),
            executor,
            colors: NotchColors::dark(),
            windows: BTreeMap::new(),
            media_epoch: 0,
        };
        let effects = hud.coordinator.start();
        let task = hud.perform(effects);
        (hud, task)
    }

    fn namespace() -> String {
        String::from("notch-hud")
    }

    fn open_window(&mut self, binding: BindingId, output: &DisplayName, placement: Rect) -> Task<Message> {
        let (id, task) = Message::layershell_open(notch_settings(output, placement));
        tracing::debug!("binding {binding} -> window {id} on {output}");
        self.windows.insert(binding, id);
        task
    }

    fn close_window(&mut self, binding: BindingId) -> Task<Message> {
        match self.windows.remove(&binding) {
            Some(id) => Task::done(Message::RemoveWindow(id)),
            None => Task::none(),
        }
    }

    fn cancel_media(&mut self) {
        self.media_epoch += 1;
        self.executor.cancel_all();
    }

    /// Carry out what the coordinator asked for.
    fn perform(&mut self, effects: Vec<Effect>) -> Task<Message> {
        let mut tasks = Vec::with_capacity(effects.len());
        for effect in effects {
            let task = match effect {
                Effect::Schedule(req) => Task::perform(delay(req.after), move |_| {
                    Message::Bus(Event::TimerFired(req.token))
                }),
                Effect::CreateSurface {
                    binding,
                    display,
                    placement,
                } => self.open_window(binding, &display, placement),
                Effect::DestroySurface { binding } => self.close_window(binding),
                // Layer surfaces can't change output, so a move is a reopen.
                Effect::MoveSurface {
                    binding,
                    display,
                    placement,
                } => {
                    let close = self.close_window(binding);
                    let open = self.open_window(binding, &display, placement);
                    Task::batch([close, open])
                }
                Effect::SelectionChanged(name) => {
                    tracing::debug!("overlay now projected on {name}");
                    Task::none()
                }
                Effect::PersistSelectedDisplay(_) => {
                    let path = config::preferences_path();
                    if let Err(e) = self.coordinator.preferences().save(&path) {
                        tracing::warn!("{e:#}");
                    }
                    Task::none()
                }
                Effect::PersistMicMuted(mic_muted) => {
                    let status = StatusMirror { mic_muted };
                    if let Err(e) = status.save(&config::status_path()) {
                        tracing::warn!("{e:#}");
                    }
                    Task::none()
                }
                Effect::QueryNowPlaying(ticket) => {
                    Task::perform(media::query_now_playing(), move |track| {
                        Message::Bus(Event::NowPlaying { ticket, track })
                    })
                }
            };
            tasks.push(task);
        }
        Task::batch(tasks)
    }

    fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::Bus(event) => {
                let shutting_down = matches!(event, Event::Shutdown);
                let effects = self.coordinator.handle(event);
                let task = self.perform(effects);
                if shutting_down {
                    self.cancel_media();
                    Task::batch([task, iced::exit()])
                } else {
                    task
                }
            }
            Message::Media(kind, parameter) => {
                let executor = self.executor.clone();
                let epoch = self.media_epoch;
                Task::perform(
                    async move { executor.execute(kind, parameter).await },
                    move |result| Message::MediaFinished {
                        kind,
                        parameter,
                        result,
                        epoch,
                    },
                )
            }
            Message::MediaFinished {
                kind,
                parameter,
                result,
                epoch,
            } => match retry_delay(&result, epoch, self.media_epoch) {
                Some(after) => Task::perform(delay(after), move |_| Message::MediaRetry {
                    kind,
                    parameter,
                    epoch,
                }),
                None => {
                    if epoch != self.media_epoch && result.is_err() {
                        tracing::debug!("{kind}: failed attempt from before cancel, not retrying");
                    }
                    Task::none()
                }
            },
            Message::MediaRetry {
                kind,
                parameter,
                epoch,
            } if epoch == self.media_epoch => Task::done(Message::Media(kind, parameter)),
            Message::MediaRetry { kind, .. } => {
                tracing::debug!("{kind}: retry dropped after cancel");
                Task::none()
            }
            Message::CancelMedia => {
                tracing::info!("cancelling pending media commands");
                self.cancel_media();
                Task::none()
            }
            _ => Task::none(),
        }
    }

    fn view(&self, window_id: IcedId) -> Element<'_, Message> {
        let binding = self
            .windows
            .iter()
            .find(|(_, id)| **id == window_id)
            .map(|(binding, _)| *binding);
        match binding {
            Some(binding) => self.view_notch(binding),
            None => iced::widget::space::Space::new().width(0).height(0).into(),
        }
    }

    fn subscription(state: &Self) -> Subscription<Message> {
        if state.coordinator.is_shut_down() {
            return Subscription::none();
        }
        Subscription::batch([
            Subscription::run(ipc::socket_listener),
            Subscription::run(ipc::topology_stream),
            Subscription::run(ipc::preference_stream),
        ])
    }

    fn style(&self, _theme: &iced::Theme) -> iced::theme::Style {
        iced::theme::Style {
            background_color: Color::TRANSPARENT,
            text_color: self.colors.text,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;

    fn attempt_failed() -> CommandResult {
        Err(CommandError::AttemptFailed {
            kind: MediaCommand::Next,
            attempts: 1,
            retry_after: Duration::from_millis(250),
            source: TransportError::Io("player busy".into()),
        })
    }

    #[test]
    fn failed_attempt_retries_after_hint() {
        assert_eq!(
            retry_delay(&attempt_failed(), 4, 4),
            Some(Duration::from_millis(250))
        );
    }

    #[test]
    fn cancel_while_in_flight_drops_retry() {
        // Dispatched at epoch 0, media-cancel bumped it before the result arrived.
        assert_eq!(retry_delay(&attempt_failed(), 0, 1), None);
    }

    #[test]
    fn settled_results_never_retry() {
        assert_eq!(retry_delay(&Ok(CommandOutcome::Completed), 0, 0), None);
        let exhausted = Err(CommandError::ExecutionFailed {
            kind: MediaCommand::Next,
            attempts: 3,
        });
        assert_eq!(retry_delay(&exhausted, 0, 0), None);
    }
}
