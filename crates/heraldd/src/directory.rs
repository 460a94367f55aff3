//! Subscriber bookkeeping and best-effort fan-out.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};

use herald_types::{Envelope, EnvelopeError, ErrorKind, Identity};
use thiserror::Error;
use tracing::{debug, warn};

use crate::status::StatusSink;
use crate::transport::{Transport, TransportError};

const BROADCAST_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::broadcast");

/// Set of identities that asked to receive notifications.
///
/// Identities are canonical and, when the directory knows the service's
/// domain, fully qualified, so the same contact never appears twice.
#[derive(Debug, Default)]
pub struct SubscriberDirectory {
    domain: Option<String>,
    contacts: Mutex<BTreeSet<Identity>>,
}

impl SubscriberDirectory {
    /// Creates an empty directory that stores identities as given.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty directory that qualifies bare identities with
    /// `domain`.
    pub fn with_domain(domain: impl Into<String>) -> Self {
        let domain = domain.into();
        Self {
            domain: Some(domain.trim().to_owned()).filter(|domain| !domain.is_empty()),
            contacts: Mutex::default(),
        }
    }

    /// Domain used to qualify bare identities.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    /// Canonicalises `raw` the way it would be stored.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidIdentity`] when `raw` is not an
    /// identity.
    pub fn canonical(&self, raw: &str) -> Result<Identity, EnvelopeError> {
        Identity::qualify(raw, self.domain().unwrap_or_default())
    }

    /// Adds a subscriber; returns `false` if it was already present.
    pub fn add(&self, identity: Identity) -> bool {
        let identity = match self.domain() {
            Some(domain) if identity.domain().is_none() => {
                Identity::qualify(identity.as_str(), domain).unwrap_or(identity)
            }
            _ => identity,
        };
        self.lock().insert(identity)
    }

    /// Canonicalises `raw` and adds it.
    ///
    /// # Errors
    ///
    /// Returns [`EnvelopeError::InvalidIdentity`] when `raw` is not an
    /// identity.
    pub fn add_raw(&self, raw: &str) -> Result<bool, EnvelopeError> {
        Ok(self.add(self.canonical(raw)?))
    }

    /// Returns `true` when `identity` is subscribed.
    pub fn contains(&self, identity: &Identity) -> bool {
        self.lock().contains(identity)
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Point-in-time copy of the subscribers in canonical order.
    pub fn snapshot(&self) -> Vec<Identity> {
        self.lock().iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<Identity>> {
        self.contacts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Errors reported by [`Broadcaster::broadcast`].
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// At least one subscriber could not be reached.
    #[error("broadcast failed for {failed} of {attempted} subscribers; first failure at {target}: {source}")]
    PartialFailure {
        /// Subscriber whose delivery failed first.
        target: Identity,
        /// Number of delivery attempts made.
        attempted: usize,
        /// Number of attempts that failed.
        failed: usize,
        /// First delivery error.
        #[source]
        source: TransportError,
    },
}

impl BroadcastError {
    /// Classification reported for this failure.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PartialFailure { .. } => ErrorKind::BroadcastPartialFailure,
        }
    }
}

/// Sends copies of an envelope to every subscriber.
pub struct Broadcaster {
    transport: Arc<dyn Transport>,
    directory: Arc<SubscriberDirectory>,
}

impl Broadcaster {
    /// Creates a broadcaster over `directory` using `transport`.
    pub fn new(transport: Arc<dyn Transport>, directory: Arc<SubscriberDirectory>) -> Self {
        Self {
            transport,
            directory,
        }
    }

    /// Directory the broadcaster reads from.
    pub fn directory(&self) -> &Arc<SubscriberDirectory> {
        &self.directory
    }

    /// Sends a copy of `template` to every subscriber.
    ///
    /// Each copy carries a fresh identifier. Every subscriber in the snapshot
    /// is attempted even after a failure. Returns the number of successful
    /// deliveries.
    ///
    /// # Errors
    ///
    /// Returns [`BroadcastError::PartialFailure`] carrying the first delivery
    /// error once all attempts have been made.
    pub fn broadcast(&self, template: &Envelope) -> Result<usize, BroadcastError> {
        let subscribers = self.directory.snapshot();
        let mut first_failure = None;
        let mut failed = 0;

        for subscriber in &subscribers {
            let copy = template.copy_for(subscriber.as_str());
            if let Err(error) = self.transport.send(&copy) {
                warn!(
                    target: BROADCAST_TARGET,
                    subscriber = %subscriber,
                    kind = %template.kind(),
                    error = %error,
                    "broadcast delivery failed"
                );
                failed += 1;
                if first_failure.is_none() {
                    first_failure = Some((subscriber.clone(), error));
                }
            }
        }

        let attempted = subscribers.len();
        debug!(
            target: BROADCAST_TARGET,
            kind = %template.kind(),
            attempted,
            failed,
            "broadcast complete"
        );
        match first_failure {
            None => Ok(attempted),
            Some((target, source)) => Err(BroadcastError::PartialFailure {
                target,
                attempted,
                failed,
                source,
            }),
        }
    }
}

impl StatusSink for Broadcaster {
    fn ready(&self) -> bool {
        self.transport.is_ready_to_send()
    }

    fn publish(&self, notification: &Envelope) -> Result<usize, BroadcastError> {
        self.broadcast(notification)
    }
}

#[cfg(test)]
mod tests {
    use herald_types::{EnvelopeType, ServiceEvent};
    use rstest::{fixture, rstest};

    use super::*;
    use crate::transport::MemoryTransport;

    fn identity(raw: &str) -> Identity {
        Identity::parse(raw).expect("identity")
    }

    #[fixture]
    fn transport() -> Arc<MemoryTransport> {
        let transport = Arc::new(MemoryTransport::new(identity("service@example.org")));
        transport.connect().expect("connect");
        transport
    }

    #[rstest]
    #[case("alice@example.org", "Alice@Example.org/phone")]
    #[case("bob@example.org", " bob@example.org ")]
    fn adding_the_same_contact_twice_keeps_one_entry(#[case] first: &str, #[case] second: &str) {
        let directory = SubscriberDirectory::new();

        assert!(directory.add_raw(first).expect("first"));
        assert!(!directory.add_raw(second).expect("second"));
        assert_eq!(directory.len(), 1);
    }

    #[rstest]
    fn bare_contacts_are_qualified_with_the_service_domain(transport: Arc<MemoryTransport>) {
        let directory = Arc::new(SubscriberDirectory::with_domain("example.org"));

        assert!(directory.add_raw("alice").expect("bare"));
        assert!(!directory.add_raw("Alice@Example.org/desk").expect("qualified"));
        assert!(!directory.add(identity("alice")));
        assert_eq!(directory.snapshot(), vec![identity("alice@example.org")]);

        let broadcaster = Broadcaster::new(transport.clone(), directory);
        let delivered = broadcaster
            .broadcast(&Envelope::notification(ServiceEvent::StatusUpdate))
            .expect("broadcast");

        assert_eq!(delivered, 1);
        assert_eq!(transport.attempts(), vec![identity("alice@example.org")]);
    }

    #[test]
    fn rejects_blank_contacts() {
        let directory = SubscriberDirectory::new();

        assert!(directory.add_raw("   ").is_err());
        assert!(directory.is_empty());
    }

    #[rstest]
    fn empty_directory_broadcast_is_a_no_op(transport: Arc<MemoryTransport>) {
        let broadcaster = Broadcaster::new(transport.clone(), Arc::new(SubscriberDirectory::new()));

        let delivered = broadcaster
            .broadcast(&Envelope::notification(ServiceEvent::Connected))
            .expect("no subscribers");

        assert_eq!(delivered, 0);
        assert!(transport.attempts().is_empty());
    }

    #[rstest]
    fn every_subscriber_is_attempted_despite_a_failure(transport: Arc<MemoryTransport>) {
        let directory = Arc::new(SubscriberDirectory::new());
        for raw in ["a@example.org", "b@example.org", "c@example.org"] {
            directory.add_raw(raw).expect("add");
        }
        transport.fail_deliveries_to("b@example.org").expect("fail");
        let broadcaster = Broadcaster::new(transport.clone(), directory);

        let error = broadcaster
            .broadcast(&Envelope::new(EnvelopeType::Alert))
            .expect_err("b fails");

        assert_eq!(transport.attempts().len(), 3);
        let delivered: Vec<_> = transport
            .sent()
            .iter()
            .filter_map(|envelope| envelope.target().map(str::to_owned))
            .collect();
        assert_eq!(delivered, vec!["a@example.org", "c@example.org"]);
        assert_eq!(error.kind(), ErrorKind::BroadcastPartialFailure);
        let BroadcastError::PartialFailure {
            target,
            attempted,
            failed,
            ..
        } = error;
        assert_eq!(target, identity("b@example.org"));
        assert_eq!((attempted, failed), (3, 1));
    }

    #[rstest]
    fn copies_carry_fresh_identifiers(transport: Arc<MemoryTransport>) {
        let directory = Arc::new(SubscriberDirectory::new());
        directory.add_raw("a@example.org").expect("add");
        directory.add_raw("b@example.org").expect("add");
        let broadcaster = Broadcaster::new(transport.clone(), directory);
        let template = Envelope::notification(ServiceEvent::Stopping);

        broadcaster.broadcast(&template).expect("broadcast");

        let sent = transport.sent();
        assert_eq!(sent.len(), 2);
        assert_ne!(sent[0].id(), sent[1].id());
        assert!(sent.iter().all(|copy| copy.id() != template.id()));
    }
}
