//! Extension points invoked by the dispatcher.

use herald_config::ServiceInfo;
use herald_types::{Envelope, Value, ValueMap};

use super::{CommandError, PendingRequest};
use crate::registry::{CommandRegistry, ServiceCommand};
use crate::status::StatusTracker;

/// Everything a command handler may read while running.
pub struct CommandContext<'a> {
    /// The resolved command.
    pub command: &'a ServiceCommand,
    /// Positional arguments, empty when none were sent.
    pub arguments: &'a [Value],
    /// The request envelope.
    pub request: &'a Envelope,
    /// All registered commands.
    pub registry: &'a CommandRegistry,
    /// Live service status.
    pub status: &'a StatusTracker,
    /// Service metadata.
    pub service: &'a ServiceInfo,
}

/// Runs a command.
///
/// The returned values are merged into the `CommandResponse`.
pub trait CommandHandler: Send + Sync {
    /// Executes the command.
    ///
    /// # Errors
    ///
    /// Returns a [`CommandError`], which becomes an Error response.
    fn handle(&self, context: &CommandContext<'_>) -> Result<ValueMap, CommandError>;
}

/// Receives `CommandResponse`s to requests this service sent.
pub trait ResponseHandler: Send + Sync {
    /// Handles a response; `request` is the matching outstanding request, if
    /// any. Any returned envelope is sent.
    fn command_response(
        &self,
        response: &Envelope,
        request: Option<&PendingRequest>,
    ) -> Option<Envelope>;
}

/// Receives inbound Alert envelopes.
pub trait AlertHandler: Send + Sync {
    /// Handles an alert. Any returned envelope is sent.
    fn alert(&self, alert: &Envelope) -> Option<Envelope>;
}

/// Response handler that drops every response.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreResponses;

impl ResponseHandler for IgnoreResponses {
    fn command_response(&self, _: &Envelope, _: Option<&PendingRequest>) -> Option<Envelope> {
        None
    }
}

/// Alert handler that drops every alert.
#[derive(Debug, Clone, Copy, Default)]
pub struct IgnoreAlerts;

impl AlertHandler for IgnoreAlerts {
    fn alert(&self, _: &Envelope) -> Option<Envelope> {
        None
    }
}
