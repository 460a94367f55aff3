//! Boundary to the pub-sub transport.
//!
//! The service core never talks to the network directly. A [`Transport`]
//! implementation owns connectivity, authentication and framing; it reports
//! connection state changes and raw inbound messages to a registered
//! [`TransportObserver`], and accepts outbound [`Envelope`]s for delivery.

use std::sync::Arc;

use herald_config::Credentials;
use herald_types::{Envelope, Identity};

mod errors;
mod inbound;
mod memory;
mod observer;

pub use self::errors::TransportError;
pub use self::inbound::{MESSAGE_SUBJECT, RawMessage, decode_inbound};
pub use self::memory::{MemoryTransport, MemoryTransportFactory};
pub use self::observer::{ConnectionState, ObserverSet, Subscription, TransportObserver};

pub(crate) const TRANSPORT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::transport");

/// Connection to the pub-sub network.
pub trait Transport: Send + Sync {
    /// Establishes the connection; blocks until the attempt completes.
    fn connect(&self) -> Result<(), TransportError>;

    /// Tears the connection down; blocks until the request is accepted.
    fn disconnect(&self) -> Result<(), TransportError>;

    /// Delivers an envelope to its target.
    ///
    /// Implementations fill in the sender when the envelope has none and
    /// qualify bare targets with their own domain.
    fn send(&self, envelope: &Envelope) -> Result<(), TransportError>;

    /// Reports whether [`Transport::send`] can currently succeed.
    fn is_ready_to_send(&self) -> bool;

    /// Adds a remote identity to the transport's contact list.
    fn add_contact(&self, identity: &Identity) -> Result<(), TransportError>;

    /// Registers an observer for state changes and inbound messages.
    ///
    /// Dropping the returned [`Subscription`] unregisters the observer.
    fn subscribe(&self, observer: Arc<dyn TransportObserver>) -> Subscription;
}

/// Builds transports from resolved credentials.
pub trait TransportFactory: Send + Sync {
    /// Creates a transport that will log in with `credentials`.
    fn create(&self, credentials: &Credentials) -> Result<Arc<dyn Transport>, TransportError>;
}
