//! Error types for service lifecycle operations.

use std::io;
use std::time::Duration;

use herald_types::{EnvelopeError, ErrorKind};
use thiserror::Error;

use crate::transport::TransportError;

/// Errors raised while starting, stopping or driving a [`Service`](super::Service).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// `start` was called on a running service.
    #[error("service is already started")]
    AlreadyStarted,

    /// The dispatch worker thread could not be spawned.
    #[error("failed to spawn dispatch worker: {source}")]
    Worker {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },

    /// The dispatch worker panicked.
    #[error("dispatch worker panicked")]
    WorkerPanic,

    /// The transport refused to connect.
    #[error("failed to connect: {source}")]
    Connect {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },

    /// The transport refused to disconnect.
    #[error("failed to disconnect: {source}")]
    Disconnect {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },

    /// The transport did not reach `Disconnected` in time.
    #[error("transport did not disconnect within {} ms", timeout.as_millis())]
    DisconnectTimeout {
        /// Budget that elapsed.
        timeout: Duration,
    },

    /// A contact could not be parsed.
    #[error(transparent)]
    InvalidContact(#[from] EnvelopeError),

    /// The transport refused a contact.
    #[error("failed to add contact: {source}")]
    Contact {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
}

impl LifecycleError {
    /// Classification reported for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidContact(error) => error.kind(),
            Self::Connect { source } | Self::Disconnect { source } | Self::Contact { source } => {
                source.kind()
            }
            Self::AlreadyStarted => ErrorKind::Conflict,
            Self::Worker { .. } | Self::WorkerPanic | Self::DisconnectTimeout { .. } => {
                ErrorKind::Diagnostic
            }
        }
    }
}
