//! Error types for transport operations.

use herald_types::{EnvelopeError, ErrorKind};
use thiserror::Error;

/// Errors reported by a [`Transport`](super::Transport).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport is not in a state that allows sending.
    #[error("transport is not connected")]
    NotConnected,

    /// The outbound envelope failed validation.
    #[error("invalid outbound envelope: {0}")]
    Envelope(#[from] EnvelopeError),

    /// The transport could not deliver to the target.
    #[error("delivery to {target} failed: {message}")]
    Delivery { target: String, message: String },

    /// Establishing the connection failed.
    #[error("failed to connect: {message}")]
    Connect { message: String },

    /// Tearing the connection down failed.
    #[error("failed to disconnect: {message}")]
    Disconnect { message: String },

    /// Adding a contact failed.
    #[error("failed to add contact {identity}: {message}")]
    Contact { identity: String, message: String },
}

impl TransportError {
    /// Classification reported for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Envelope(error) => error.kind(),
            Self::NotConnected
            | Self::Delivery { .. }
            | Self::Connect { .. }
            | Self::Disconnect { .. }
            | Self::Contact { .. } => ErrorKind::TransportSendFailure,
        }
    }

    /// Creates a delivery error.
    pub fn delivery(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Delivery {
            target: target.into(),
            message: message.into(),
        }
    }

    /// Creates a connect error.
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect {
            message: message.into(),
        }
    }

    /// Creates a disconnect error.
    pub fn disconnect(message: impl Into<String>) -> Self {
        Self::Disconnect {
            message: message.into(),
        }
    }
}
