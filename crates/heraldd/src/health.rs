//! Structured health reporting for service lifecycle events.

use std::sync::Arc;

use herald_config::Config;
use herald_types::{Envelope, EnvelopeError, Identity, ServiceEvent};

use crate::bootstrap::BootstrapError;
use crate::directory::BroadcastError;
use crate::transport::{ConnectionState, TransportError};

const HEALTH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::health");

/// Observer for events an operator should see.
pub trait HealthReporter: Send + Sync {
    /// Invoked before configuration loading begins.
    fn bootstrap_starting(&self);

    /// Invoked after bootstrap built the service.
    fn bootstrap_succeeded(&self, config: &Config, identity: &Identity);

    /// Invoked when bootstrap fails.
    fn bootstrap_failed(&self, error: &BootstrapError);

    /// Invoked whenever the transport reports a new connection state.
    fn connection_state_changed(&self, state: ConnectionState);

    /// Invoked when a lifecycle notification did not reach every subscriber.
    fn notification_failed(&self, event: ServiceEvent, error: &BroadcastError);

    /// Invoked when a response could not be sent.
    fn send_failed(&self, envelope: &Envelope, error: &TransportError);

    /// Invoked when an inbound message is dropped because it cannot be
    /// decoded.
    fn inbound_dropped(&self, from: &str, error: &EnvelopeError);
}

impl<T> HealthReporter for Arc<T>
where
    T: HealthReporter,
{
    fn bootstrap_starting(&self) {
        (**self).bootstrap_starting();
    }

    fn bootstrap_succeeded(&self, config: &Config, identity: &Identity) {
        (**self).bootstrap_succeeded(config, identity);
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        (**self).bootstrap_failed(error);
    }

    fn connection_state_changed(&self, state: ConnectionState) {
        (**self).connection_state_changed(state);
    }

    fn notification_failed(&self, event: ServiceEvent, error: &BroadcastError) {
        (**self).notification_failed(event, error);
    }

    fn send_failed(&self, envelope: &Envelope, error: &TransportError) {
        (**self).send_failed(envelope, error);
    }

    fn inbound_dropped(&self, from: &str, error: &EnvelopeError) {
        (**self).inbound_dropped(from, error);
    }
}

/// Default reporter that records events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHealthReporter;

impl StructuredHealthReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl HealthReporter for StructuredHealthReporter {
    fn bootstrap_starting(&self) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_starting",
            "starting service bootstrap"
        );
    }

    fn bootstrap_succeeded(&self, config: &Config, identity: &Identity) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "bootstrap_succeeded",
            identity = %identity,
            log_filter = %config.log_filter(),
            log_format = %config.log_format(),
            status_notifications = %config.status_notifications(),
            "service bootstrap completed"
        );
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        tracing::error!(
            target: HEALTH_TARGET,
            event = "bootstrap_failed",
            error = %error,
            "service bootstrap failed"
        );
    }

    fn connection_state_changed(&self, state: ConnectionState) {
        tracing::info!(
            target: HEALTH_TARGET,
            event = "connection_state_changed",
            state = %state,
            "connection state changed"
        );
    }

    fn notification_failed(&self, event: ServiceEvent, error: &BroadcastError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "notification_failed",
            service_event = %event,
            kind = %error.kind(),
            error = %error,
            "notification did not reach every subscriber"
        );
    }

    fn send_failed(&self, envelope: &Envelope, error: &TransportError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "send_failed",
            id = %envelope.id(),
            envelope_type = %envelope.kind(),
            to = envelope.target().unwrap_or_default(),
            error = %error,
            "failed to send envelope"
        );
    }

    fn inbound_dropped(&self, from: &str, error: &EnvelopeError) {
        tracing::warn!(
            target: HEALTH_TARGET,
            event = "inbound_dropped",
            from,
            error = %error,
            "dropped undecodable message"
        );
    }
}
