//! Matching of responses to requests this service sent.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use herald_types::{Envelope, EnvelopeId};

/// Outstanding request awaiting a response.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    /// The request as sent.
    pub request: Envelope,
    /// When the request was recorded.
    pub sent_at: Instant,
}

/// Table of outstanding requests keyed by envelope identifier.
///
/// A request is matched at most once.
#[derive(Debug, Default)]
pub struct Correlator {
    pending: Mutex<HashMap<EnvelopeId, PendingRequest>>,
}

impl Correlator {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `request` as outstanding.
    pub fn track(&self, request: &Envelope) {
        self.lock().insert(
            request.id().clone(),
            PendingRequest {
                request: request.clone(),
                sent_at: Instant::now(),
            },
        );
    }

    /// Forgets a request without resolving it.
    pub fn forget(&self, id: &EnvelopeId) -> Option<PendingRequest> {
        self.lock().remove(id)
    }

    /// Removes and returns the request `response` answers.
    pub fn resolve(&self, response: &Envelope) -> Option<PendingRequest> {
        let id = response.response_id()?;
        self.lock().remove(id)
    }

    /// Drops requests at least `max_age` old; returns how many were dropped.
    pub fn expire(&self, max_age: Duration) -> usize {
        let mut pending = self.lock();
        let before = pending.len();
        pending.retain(|_, entry| entry.sent_at.elapsed() < max_age);
        before - pending.len()
    }

    /// Number of outstanding requests.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns `true` when nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<EnvelopeId, PendingRequest>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
