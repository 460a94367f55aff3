//! In-process transport.
//!
//! [`MemoryTransport`] keeps outbound envelopes in an outbox instead of
//! putting them on a network. Embedders use it to run the service without a
//! broker; tests use it to inject state changes and inbound messages and to
//! inspect what the service sent.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use herald_config::Credentials;
use herald_types::{Envelope, Identity};
use tracing::debug;

use super::{
    ConnectionState, ObserverSet, RawMessage, Subscription, TRANSPORT_TARGET, Transport,
    TransportError, TransportFactory, TransportObserver,
};

/// Transport that delivers into an in-memory outbox.
pub struct MemoryTransport {
    identity: Identity,
    state: Mutex<ConnectionState>,
    observers: ObserverSet,
    outbox: Mutex<Vec<Envelope>>,
    attempts: Mutex<Vec<Identity>>,
    contacts: Mutex<BTreeSet<Identity>>,
    failing: Mutex<BTreeSet<Identity>>,
}

impl MemoryTransport {
    /// Creates a disconnected transport logged in as `identity`.
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            state: Mutex::new(ConnectionState::Disconnected),
            observers: ObserverSet::new(),
            outbox: Mutex::new(Vec::new()),
            attempts: Mutex::new(Vec::new()),
            contacts: Mutex::new(BTreeSet::new()),
            failing: Mutex::new(BTreeSet::new()),
        }
    }

    /// Identity the transport sends as.
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Moves to `state` and notifies observers, as a broker-initiated change
    /// would.
    pub fn inject_state(&self, state: ConnectionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        debug!(target: TRANSPORT_TARGET, %state, "connection state changed");
        self.observers.notify_state(state);
    }

    /// Hands a raw message to observers as if it had arrived from the network.
    pub fn inject_message(&self, message: &RawMessage) {
        self.observers.notify_message(message);
    }

    /// Frames `envelope` and delivers it to observers as coming from `from`.
    ///
    /// # Errors
    ///
    /// Returns an error when the envelope cannot be encoded.
    pub fn deliver(&self, from: &str, envelope: &Envelope) -> Result<(), TransportError> {
        let raw = RawMessage::for_envelope(from, envelope)?;
        self.inject_message(&raw);
        Ok(())
    }

    /// Makes every later send to `target` fail.
    ///
    /// # Errors
    ///
    /// Returns an error when `target` is not a valid identity.
    pub fn fail_deliveries_to(&self, target: &str) -> Result<(), TransportError> {
        let identity = Identity::qualify(target, self.domain())?;
        self.failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity);
        Ok(())
    }

    /// Envelopes delivered so far, in send order.
    pub fn sent(&self) -> Vec<Envelope> {
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drains the outbox.
    pub fn take_sent(&self) -> Vec<Envelope> {
        std::mem::take(&mut *self.outbox.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Targets of every send attempt, including failed ones.
    pub fn attempts(&self) -> Vec<Identity> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Contacts added through [`Transport::add_contact`].
    pub fn contacts(&self) -> Vec<Identity> {
        self.contacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    fn domain(&self) -> &str {
        self.identity.domain().unwrap_or_default()
    }
}

impl Transport for MemoryTransport {
    fn connect(&self) -> Result<(), TransportError> {
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }
        self.inject_state(ConnectionState::Connecting);
        self.inject_state(ConnectionState::Connected);
        Ok(())
    }

    fn disconnect(&self) -> Result<(), TransportError> {
        if self.state() == ConnectionState::Disconnected {
            return Ok(());
        }
        self.inject_state(ConnectionState::Disconnecting);
        self.inject_state(ConnectionState::Disconnected);
        Ok(())
    }

    fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        envelope.validate_outbound()?;
        let target = Identity::qualify(envelope.target().unwrap_or_default(), self.domain())?;
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(target.clone());

        if !self.is_ready_to_send() {
            return Err(TransportError::NotConnected);
        }
        if self
            .failing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&target)
        {
            return Err(TransportError::delivery(target.as_str(), "delivery refused"));
        }

        let mut outbound = envelope.clone();
        if outbound.sender().is_none() {
            outbound.set_sender(self.identity.as_str());
        }
        outbound.set_target(target.as_str());
        // Encoding proves the envelope would survive the wire.
        outbound.encode()?;
        debug!(
            target: TRANSPORT_TARGET,
            id = %outbound.id(),
            kind = %outbound.kind(),
            to = %target,
            "envelope sent"
        );
        self.outbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(outbound);
        Ok(())
    }

    fn is_ready_to_send(&self) -> bool {
        matches!(
            self.state(),
            ConnectionState::Connected | ConnectionState::Disconnecting
        )
    }

    fn add_contact(&self, identity: &Identity) -> Result<(), TransportError> {
        self.contacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(identity.clone());
        Ok(())
    }

    fn subscribe(&self, observer: Arc<dyn TransportObserver>) -> Subscription {
        self.observers.subscribe(observer)
    }
}

/// Factory producing [`MemoryTransport`]s.
///
/// The most recently created transport stays reachable through
/// [`MemoryTransportFactory::last_created`].
#[derive(Default)]
pub struct MemoryTransportFactory {
    last: Mutex<Option<Arc<MemoryTransport>>>,
}

impl MemoryTransportFactory {
    /// Creates a factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport returned by the latest call to [`TransportFactory::create`].
    pub fn last_created(&self) -> Option<Arc<MemoryTransport>> {
        self.last
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TransportFactory for MemoryTransportFactory {
    fn create(&self, credentials: &Credentials) -> Result<Arc<dyn Transport>, TransportError> {
        let transport = Arc::new(MemoryTransport::new(credentials.username().clone()));
        *self.last.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&transport));
        Ok(transport)
    }
}

#[cfg(test)]
mod tests {
    use herald_types::{EnvelopeType, ErrorKind};
    use rstest::{fixture, rstest};

    use super::*;

    #[fixture]
    fn transport() -> MemoryTransport {
        MemoryTransport::new(Identity::parse("service@example.org").expect("identity"))
    }

    fn ping_to(target: &str) -> Envelope {
        Envelope::new(EnvelopeType::Ping).with_target(target)
    }

    #[rstest]
    fn refuses_to_send_while_disconnected(transport: MemoryTransport) {
        let error = transport.send(&ping_to("a@example.org")).expect_err("offline");

        assert!(matches!(error, TransportError::NotConnected));
        assert_eq!(error.kind(), ErrorKind::TransportSendFailure);
    }

    #[rstest]
    fn fills_sender_and_qualifies_bare_targets(transport: MemoryTransport) {
        transport.connect().expect("connect");

        transport.send(&ping_to("alice")).expect("send");

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].sender(), Some("service@example.org"));
        assert_eq!(sent[0].target(), Some("alice@example.org"));
    }

    #[rstest]
    fn rejects_envelopes_without_target(transport: MemoryTransport) {
        transport.connect().expect("connect");

        let error = transport
            .send(&Envelope::new(EnvelopeType::Ping))
            .expect_err("no target");

        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(transport.attempts().is_empty());
    }

    #[rstest]
    fn injected_failures_are_recorded_as_attempts(transport: MemoryTransport) {
        transport.connect().expect("connect");
        transport.fail_deliveries_to("b@example.org").expect("fail");

        let error = transport.send(&ping_to("B@example.org")).expect_err("refused");

        assert!(matches!(error, TransportError::Delivery { .. }));
        assert_eq!(transport.attempts().len(), 1);
        assert!(transport.sent().is_empty());
    }
}
