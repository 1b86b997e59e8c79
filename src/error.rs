use std::time::Duration;

use thiserror::Error;

use crate::display::BindingId;
use crate::media::MediaCommand;
use crate::notch::Phase;

/// A guard rejected a surface transition. Recovered locally as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot {requested} while {from:?}")]
pub struct InvalidTransition {
    pub from: Phase,
    pub requested: &'static str,
}

/// Failures surfaced to callers of the command executor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// The attempt budget was exhausted; the transport was not invoked.
    #[error("{kind} failed: max attempts exceeded ({attempts})")]
    ExecutionFailed { kind: MediaCommand, attempts: u32 },
    /// A single attempt failed; the caller may retry after `retry_after`.
    #[error("{kind} attempt {attempts} failed: {source}")]
    AttemptFailed {
        kind: MediaCommand,
        attempts: u32,
        retry_after: Duration,
        #[source]
        source: TransportError,
    },
    /// No transport is available. Does not consume the retry budget.
    #[error("media transport unavailable")]
    TransportUnavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("{0} not found")]
    Unavailable(String),
    #[error("{program} exited with {status}")]
    Failed { program: String, status: String },
    #[error("{0}")]
    Io(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    /// An event arrived for a binding that has already been torn down.
    #[error("no display binding {0}")]
    DisplayBindingMissing(BindingId),
}
