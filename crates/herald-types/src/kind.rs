//! Closed vocabularies used on the wire.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Message type of an [`Envelope`](crate::Envelope).
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum EnvelopeType {
    /// Type not yet assigned.
    #[default]
    NotSet,
    /// Liveness check.
    Ping,
    /// Answer to [`EnvelopeType::Ping`].
    PingResponse,
    /// Named command invocation.
    Command,
    /// Answer to [`EnvelopeType::Command`].
    CommandResponse,
    /// Request to receive broadcast notifications.
    Subscribe,
    /// Answer to [`EnvelopeType::Subscribe`].
    SubscribeResponse,
    /// Request for the current service status.
    StatusRequest,
    /// Answer to [`EnvelopeType::StatusRequest`].
    StatusResponse,
    /// Asynchronous service event pushed to subscribers.
    Notification,
    /// Alert raised by a remote party; `SubType` carries the alert code.
    Alert,
    /// Failure report.
    Error,
    /// Request for a diagnostic [`EnvelopeType::Error`] reply.
    ErrorTest,
}

/// Service event announced through a notification.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ServiceEvent {
    /// The transport finished connecting.
    Connected,
    /// The transport started disconnecting.
    Disconnecting,
    /// The service was asked to stop.
    Stopping,
    /// The status code (and possibly message or details) changed.
    StatusUpdate,
}

impl ServiceEvent {
    /// Default human-readable description carried with the notification.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Connected => "Service connected",
            Self::Disconnecting => "Service disconnecting",
            Self::Stopping => "Service stopping",
            Self::StatusUpdate => "Service status changed",
        }
    }
}

/// Classification attached to Error envelopes and to internal errors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[strum(ascii_case_insensitive)]
pub enum ErrorKind {
    /// Input failed validation (missing target, bad token, bad shortcut).
    Validation,
    /// A command with the same name or shortcut already exists.
    Conflict,
    /// The requested command is not registered.
    UnknownCommand,
    /// The requested command is registered but not implemented.
    NotImplemented,
    /// The transport failed to deliver a message.
    TransportSendFailure,
    /// An inbound payload could not be decoded.
    DeserializationFailure,
    /// At least one recipient of a broadcast failed.
    BroadcastPartialFailure,
    /// A command handler reported a failure.
    CommandFailed,
    /// Deliberate error produced for diagnostics.
    Diagnostic,
}
