//! Error types raised while dispatching.

use herald_types::{EnvelopeError, ErrorKind};
use thiserror::Error;

/// Failure reported by a [`CommandHandler`](super::CommandHandler).
#[derive(Debug, Error)]
pub enum CommandError {
    /// The arguments did not fit the command.
    #[error("invalid arguments: {message}")]
    InvalidArguments { message: String },

    /// The command ran and failed.
    #[error("{message}")]
    Failed { message: String },

    /// Reading the request failed.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

impl CommandError {
    /// Creates an invalid-arguments error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }

    /// Creates a generic failure.
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Classification reported for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArguments { .. } => ErrorKind::Validation,
            Self::Failed { .. } => ErrorKind::CommandFailed,
            Self::Envelope(error) => error.kind(),
        }
    }
}

/// Reasons a command envelope produced an Error response.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The envelope did not carry a usable command.
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// No command matches the token.
    #[error("unknown command '{command}'")]
    UnknownCommand { command: String },

    /// The command is declared but not implemented.
    #[error("command '{command}' is not implemented")]
    NotImplemented { command: String },

    /// The handler failed.
    #[error("command '{command}' failed: {source}")]
    Command {
        command: String,
        #[source]
        source: CommandError,
    },
}

impl DispatchError {
    /// Creates an unknown-command error.
    pub fn unknown_command(command: impl Into<String>) -> Self {
        Self::UnknownCommand {
            command: command.into(),
        }
    }

    /// Creates a not-implemented error.
    pub fn not_implemented(command: impl Into<String>) -> Self {
        Self::NotImplemented {
            command: command.into(),
        }
    }

    /// Classification reported for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Envelope(error) => error.kind(),
            Self::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            Self::NotImplemented { .. } => ErrorKind::NotImplemented,
            Self::Command { source, .. } => source.kind(),
        }
    }
}
