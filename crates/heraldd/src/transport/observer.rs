//! Observer registration for transport events.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use strum::Display;

use super::inbound::RawMessage;

/// Connection state reported by the transport.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionState {
    /// No session is established.
    #[default]
    Disconnected,
    /// A session is being established.
    Connecting,
    /// The session is established and messages can flow.
    Connected,
    /// The session is being torn down.
    Disconnecting,
}

/// Receives events from a transport.
///
/// Callbacks may run on transport-owned threads and must not block.
pub trait TransportObserver: Send + Sync {
    /// Invoked after the connection state changes.
    fn state_changed(&self, state: ConnectionState);

    /// Invoked for every raw message received.
    fn message_received(&self, message: RawMessage);
}

type Slots = Mutex<Vec<(u64, Arc<dyn TransportObserver>)>>;

#[derive(Default)]
struct Registry {
    next_id: Mutex<u64>,
    slots: Slots,
}

/// Set of observers a transport implementation notifies.
#[derive(Clone, Default)]
pub struct ObserverSet {
    registry: Arc<Registry>,
}

impl ObserverSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer; it stays registered until the handle is dropped.
    pub fn subscribe(&self, observer: Arc<dyn TransportObserver>) -> Subscription {
        let id = {
            let mut next = self
                .registry
                .next_id
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            *next += 1;
            *next
        };
        self.registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        Subscription {
            id,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` when no observer is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Notifies every observer of a state change.
    pub fn notify_state(&self, state: ConnectionState) {
        for observer in self.observers() {
            observer.state_changed(state);
        }
    }

    /// Notifies every observer of an inbound message.
    pub fn notify_message(&self, message: &RawMessage) {
        for observer in self.observers() {
            observer.message_received(message.clone());
        }
    }

    fn observers(&self) -> Vec<Arc<dyn TransportObserver>> {
        self.registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

/// Handle keeping an observer registered.
#[must_use = "dropping the subscription unregisters the observer"]
pub struct Subscription {
    id: u64,
    registry: Weak<Registry>,
}

impl Subscription {
    /// Unregisters the observer immediately.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        registry
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}
