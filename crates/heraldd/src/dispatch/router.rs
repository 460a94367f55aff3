//! Envelope routing table.

use std::sync::Arc;

use herald_config::ServiceInfo;
use herald_types::{Envelope, EnvelopeError, EnvelopeType, ErrorKind, fields};
use tracing::{debug, info, warn};

use super::{
    AlertHandler, CommandContext, Correlator, DISPATCH_TARGET, DispatchError, IgnoreAlerts,
    IgnoreResponses, ResponseHandler,
};
use crate::directory::SubscriberDirectory;
use crate::registry::CommandRegistry;
use crate::status::StatusTracker;

/// Reason carried by the response to an `ErrorTest` request.
pub(crate) const ERROR_TEST_MESSAGE: &str = "Error test requested";

/// Maps inbound envelopes to responses.
pub struct Dispatcher {
    registry: Arc<CommandRegistry>,
    directory: Arc<SubscriberDirectory>,
    status: Arc<StatusTracker>,
    service: ServiceInfo,
    correlator: Arc<Correlator>,
    responses: Arc<dyn ResponseHandler>,
    alerts: Arc<dyn AlertHandler>,
}

impl Dispatcher {
    /// Creates a dispatcher that ignores responses and alerts.
    pub fn new(
        registry: Arc<CommandRegistry>,
        directory: Arc<SubscriberDirectory>,
        status: Arc<StatusTracker>,
        service: ServiceInfo,
    ) -> Self {
        Self {
            registry,
            directory,
            status,
            service,
            correlator: Arc::new(Correlator::new()),
            responses: Arc::new(IgnoreResponses),
            alerts: Arc::new(IgnoreAlerts),
        }
    }

    /// Replaces the response handler.
    #[must_use]
    pub fn with_response_handler(mut self, handler: Arc<dyn ResponseHandler>) -> Self {
        self.responses = handler;
        self
    }

    /// Replaces the alert handler.
    #[must_use]
    pub fn with_alert_handler(mut self, handler: Arc<dyn AlertHandler>) -> Self {
        self.alerts = handler;
        self
    }

    /// Table of requests awaiting responses.
    pub fn correlator(&self) -> &Arc<Correlator> {
        &self.correlator
    }

    /// Registered commands.
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.registry
    }

    /// Routes one inbound envelope; returns the envelope to send back, if
    /// any.
    pub fn handle(&self, inbound: &Envelope) -> Option<Envelope> {
        debug!(
            target: DISPATCH_TARGET,
            id = %inbound.id(),
            kind = %inbound.kind(),
            from = inbound.sender().unwrap_or_default(),
            "dispatching envelope"
        );
        match inbound.kind() {
            EnvelopeType::Subscribe => Some(self.subscribe(inbound)),
            EnvelopeType::StatusRequest => Some(self.status_response(inbound)),
            EnvelopeType::Ping => Some(Envelope::response_to(inbound, EnvelopeType::PingResponse)),
            EnvelopeType::ErrorTest => Some(Envelope::error_for(
                ERROR_TEST_MESSAGE,
                ErrorKind::Diagnostic,
                Some(inbound),
            )),
            EnvelopeType::Command => Some(self.command(inbound)),
            EnvelopeType::CommandResponse => {
                let request = self.correlator.resolve(inbound);
                if request.is_none() {
                    debug!(
                        target: DISPATCH_TARGET,
                        id = %inbound.id(),
                        "command response does not match an outstanding request"
                    );
                }
                self.responses.command_response(inbound, request.as_ref())
            }
            EnvelopeType::Alert => self.alerts.alert(inbound),
            EnvelopeType::NotSet
            | EnvelopeType::PingResponse
            | EnvelopeType::SubscribeResponse
            | EnvelopeType::StatusResponse
            | EnvelopeType::Notification
            | EnvelopeType::Error => None,
        }
    }

    fn subscribe(&self, inbound: &Envelope) -> Envelope {
        let subscriber = inbound
            .sender()
            .ok_or_else(|| EnvelopeError::invalid_identity(""))
            .and_then(|sender| self.directory.canonical(sender));
        match subscriber {
            Ok(subscriber) => {
                info!(target: DISPATCH_TARGET, subscriber = %subscriber, "subscriber added");
                self.directory.add(subscriber);
                Envelope::response_to(inbound, EnvelopeType::SubscribeResponse)
            }
            Err(error) => {
                warn!(target: DISPATCH_TARGET, error = %error, "subscribe rejected");
                Envelope::error_for(error.to_string(), error.kind(), Some(inbound))
            }
        }
    }

    fn status_response(&self, inbound: &Envelope) -> Envelope {
        let mut response = Envelope::response_to(inbound, EnvelopeType::StatusResponse);
        self.status.snapshot().write_fields(&mut response);
        response
    }

    fn command(&self, inbound: &Envelope) -> Envelope {
        self.execute(inbound).unwrap_or_else(|error| {
            warn!(
                target: DISPATCH_TARGET,
                id = %inbound.id(),
                kind = %error.kind(),
                error = %error,
                "command failed"
            );
            Envelope::error_for(error.to_string(), error.kind(), Some(inbound))
        })
    }

    fn execute(&self, inbound: &Envelope) -> Result<Envelope, DispatchError> {
        let token = inbound.command_name()?;
        let entry = self
            .registry
            .resolve(token)
            .ok_or_else(|| DispatchError::unknown_command(token))?;
        let command = entry.command();
        if !command.implemented() {
            return Err(DispatchError::not_implemented(command.name()));
        }
        let arguments = inbound.command_arguments()?;

        let mut response = Envelope::response_to(inbound, EnvelopeType::CommandResponse);
        if let Some(handler) = entry.handler() {
            let context = CommandContext {
                command,
                arguments: &arguments,
                request: inbound,
                registry: &self.registry,
                status: &self.status,
                service: &self.service,
            };
            let output = handler
                .handle(&context)
                .map_err(|source| DispatchError::Command {
                    command: command.name().to_owned(),
                    source,
                })?;
            response.values_mut().extend_from(output);
        }
        response.insert(fields::ORIGINAL_COMMAND, command.name());
        debug!(
            target: DISPATCH_TARGET,
            id = %inbound.id(),
            command = command.name(),
            "command handled"
        );
        Ok(response)
    }
}
