//! Media command execution with per-kind dedup and a bounded retry budget.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::{CommandError, TransportError};
use crate::media::{MediaCommand, MediaTransport};

pub const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Completed,
    /// The same kind was already in flight; nothing was sent.
    DuplicateSuppressed,
}

pub type CommandResult = Result<CommandOutcome, CommandError>;

type OutcomeObserver = Arc<dyn Fn(MediaCommand, &CommandResult) + Send + Sync>;

#[derive(Debug, Clone, Copy, Default)]
struct PendingCommand {
    /// Consecutive failed attempts.
    attempts: u32,
    in_flight: bool,
}

#[derive(Debug, Default)]
struct Table {
    entries: [PendingCommand; MediaCommand::COUNT],
    /// Bumped by `cancel_all`; completions from an older epoch are dropped.
    epoch: u64,
}

fn backoff(attempts: u32) -> Duration {
    BACKOFF_BASE * 2u32.saturating_pow(attempts.saturating_sub(1))
}

#[derive(Clone)]
pub struct CommandExecutor {
    transport: Arc<dyn MediaTransport>,
    table: Arc<Mutex<Table>>,
    observers: Arc<Mutex<Vec<OutcomeObserver>>>,
}

impl CommandExecutor {
    pub fn new(transport: Arc<dyn MediaTransport>) -> Self {
        Self {
            transport,
            table: Arc::new(Mutex::new(Table::default())),
            observers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a callback invoked with every outcome.
    pub fn on_outcome(&self, observer: impl Fn(MediaCommand, &CommandResult) + Send + Sync + 'static) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(observer));
    }

    fn report(&self, kind: MediaCommand, result: CommandResult) -> CommandResult {
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer(kind, &result);
        }
        result
    }

    pub fn is_in_flight(&self, kind: MediaCommand) -> bool {
        self.table().entries[kind.index()].in_flight
    }

    #[allow(dead_code)]
    pub fn attempts(&self, kind: MediaCommand) -> u32 {
        self.table().entries[kind.index()].attempts
    }

    pub async fn execute(&self, kind: MediaCommand, parameter: Option<f64>) -> CommandResult {
        if !self.transport.is_available() {
            return self.report(kind, Err(CommandError::TransportUnavailable));
        }

        let guard = match self.admit(kind) {
            Admission::Run(guard) => guard,
            Admission::Duplicate => {
                tracing::debug!("{kind} already in flight; duplicate suppressed");
                return self.report(kind, Ok(CommandOutcome::DuplicateSuppressed));
            }
            Admission::Exhausted(attempts) => {
                tracing::warn!("{kind}: giving up after {attempts} attempt(s)");
                return self.report(kind, Err(CommandError::ExecutionFailed { kind, attempts }));
            }
        };

        let sent = self.transport.send_command(kind, parameter).await;
        let result = guard.finish(sent);
        self.report(kind, result)
    }

    /// Mark `kind` in flight unless it is already running or out of budget.
    /// An exhausted entry is cleared so the following call starts over.
    fn admit(&self, kind: MediaCommand) -> Admission {
        let mut table = self.table();
        let epoch = table.epoch;
        let entry = &mut table.entries[kind.index()];
        if entry.in_flight {
            return Admission::Duplicate;
        }
        if entry.attempts >= MAX_ATTEMPTS {
            let attempts = entry.attempts;
            *entry = PendingCommand::default();
            return Admission::Exhausted(attempts);
        }
        entry.in_flight = true;
        Admission::Run(InFlight {
            table: Arc::clone(&self.table),
            kind,
            epoch,
            finished: false,
        })
    }

    /// Forget every in-flight marker and counter. Completions still running
    /// will not touch the table.
    pub fn cancel_all(&self) {
        let mut table = self.table();
        table.epoch += 1;
        table.entries = Default::default();
    }
}

enum Admission {
    Run(InFlight),
    Duplicate,
    Exhausted(u32),
}

/// Owns one kind's in-flight marker until the transport call completes or
/// the awaiting future is dropped.
struct InFlight {
    table: Arc<Mutex<Table>>,
    kind: MediaCommand,
    epoch: u64,
    finished: bool,
}

impl InFlight {
    fn finish(mut self, sent: Result<(), TransportError>) -> CommandResult {
        self.finished = true;
        let kind = self.kind;
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let current = table.epoch == self.epoch;
        let entry = &mut table.entries[kind.index()];
        if current {
            entry.in_flight = false;
        }
        match sent {
            Ok(()) => {
                if current {
                    entry.attempts = 0;
                }
                Ok(CommandOutcome::Completed)
            }
            Err(TransportError::Unavailable(what)) => {
                tracing::debug!("{kind}: {what} unavailable");
                Err(CommandError::TransportUnavailable)
            }
            Err(source) => {
                let attempts = if current {
                    entry.attempts += 1;
                    entry.attempts
                } else {
                    1
                };
                Err(CommandError::AttemptFailed {
                    kind,
                    attempts,
                    retry_after: backoff(attempts),
                    source,
                })
            }
        }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        if table.epoch == self.epoch {
            table.entries[self.kind.index()].in_flight = false;
        }
    }
}
