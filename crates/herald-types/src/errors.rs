//! Errors raised while building, validating or decoding envelopes.

use thiserror::Error;

use crate::kind::{EnvelopeType, ErrorKind};

/// Failures surfaced by the envelope model.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// Outbound envelope has no target.
    #[error("envelope {id} has no target")]
    MissingTarget {
        /// Identifier of the offending envelope.
        id: String,
    },

    /// Identity text was empty or malformed.
    #[error("invalid identity '{value}'")]
    InvalidIdentity {
        /// Raw text that failed to parse.
        value: String,
    },

    /// Operation requires a command envelope.
    #[error("envelope is of type {actual}, expected a command")]
    NotACommand {
        /// Type of the envelope that was supplied.
        actual: EnvelopeType,
    },

    /// Command envelope lacks a usable command token.
    #[error("command envelope has no command: {message}")]
    MissingCommand {
        /// Description of what was wrong with the token.
        message: String,
    },

    /// Argument list or a single argument had the wrong shape.
    #[error("invalid arguments: {message}")]
    InvalidArguments {
        /// Description of the mismatch.
        message: String,
    },

    /// Payload text could not be decoded.
    #[error("malformed envelope payload: {source}")]
    Malformed {
        /// Underlying decoder error.
        #[source]
        source: serde_json::Error,
    },

    /// Envelope could not be encoded.
    #[error("failed to encode envelope: {source}")]
    Encode {
        /// Underlying encoder error.
        #[source]
        source: serde_json::Error,
    },
}

impl EnvelopeError {
    /// Classification used when the error is reported to a remote party.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Malformed { .. } => ErrorKind::DeserializationFailure,
            Self::MissingTarget { .. }
            | Self::InvalidIdentity { .. }
            | Self::NotACommand { .. }
            | Self::MissingCommand { .. }
            | Self::InvalidArguments { .. }
            | Self::Encode { .. } => ErrorKind::Validation,
        }
    }

    /// Creates a missing target error.
    pub fn missing_target(id: impl ToString) -> Self {
        Self::MissingTarget { id: id.to_string() }
    }

    /// Creates an invalid identity error.
    pub fn invalid_identity(value: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            value: value.into(),
        }
    }

    /// Creates a missing command error.
    pub fn missing_command(message: impl Into<String>) -> Self {
        Self::MissingCommand {
            message: message.into(),
        }
    }

    /// Creates an invalid arguments error.
    pub fn invalid_arguments(message: impl Into<String>) -> Self {
        Self::InvalidArguments {
            message: message.into(),
        }
    }
}
