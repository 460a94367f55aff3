//! Dispatch worker fed by transport callbacks.
//!
//! Transport callbacks only enqueue events; every envelope is decoded,
//! dispatched and answered on the worker thread, so handlers never run
//! concurrently with each other.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use super::{LIFECYCLE_TARGET, LifecycleError, Shared};
use crate::transport::{ConnectionState, RawMessage, TransportObserver, decode_inbound};

pub(super) enum WorkerEvent {
    State(ConnectionState),
    Message(RawMessage),
    Shutdown,
}

/// Observer that forwards transport callbacks to the worker queue.
pub(super) struct Forwarder {
    events: Sender<WorkerEvent>,
}

impl Forwarder {
    pub(super) fn new(events: Sender<WorkerEvent>) -> Self {
        Self { events }
    }

    fn forward(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            debug!(target: LIFECYCLE_TARGET, "dispatch worker gone; event discarded");
        }
    }
}

impl TransportObserver for Forwarder {
    fn state_changed(&self, state: ConnectionState) {
        self.forward(WorkerEvent::State(state));
    }

    fn message_received(&self, message: RawMessage) {
        self.forward(WorkerEvent::Message(message));
    }
}

/// Running worker thread.
pub(super) struct WorkerHandle {
    events: Sender<WorkerEvent>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    pub(super) fn spawn(
        shared: Arc<Shared>,
        events: Sender<WorkerEvent>,
        inbox: Receiver<WorkerEvent>,
    ) -> Result<Self, LifecycleError> {
        let thread = thread::Builder::new()
            .name("herald-dispatch".to_owned())
            .spawn(move || run(&shared, &inbox))
            .map_err(|source| LifecycleError::Worker { source })?;
        Ok(Self { events, thread })
    }

    /// Asks the worker to finish queued events and exit, then joins it.
    pub(super) fn shutdown(self) -> Result<(), LifecycleError> {
        if self.events.send(WorkerEvent::Shutdown).is_err() {
            debug!(target: LIFECYCLE_TARGET, "dispatch worker already stopped");
        }
        self.thread.join().map_err(|_| LifecycleError::WorkerPanic)
    }
}

fn run(shared: &Shared, inbox: &Receiver<WorkerEvent>) {
    debug!(target: LIFECYCLE_TARGET, "dispatch worker started");
    for event in inbox {
        match event {
            WorkerEvent::State(state) => shared.enter_state(state),
            WorkerEvent::Message(message) => process(shared, &message),
            WorkerEvent::Shutdown => break,
        }
    }
    debug!(target: LIFECYCLE_TARGET, "dispatch worker stopped");
}

fn process(shared: &Shared, message: &RawMessage) {
    let envelope = match decode_inbound(message) {
        Ok(Some(envelope)) => envelope,
        Ok(None) => {
            trace!(target: LIFECYCLE_TARGET, from = %message.from, "ignoring foreign message");
            return;
        }
        Err(error) => {
            shared.reporter.inbound_dropped(&message.from, &error);
            return;
        }
    };
    let Some(reply) = shared.dispatcher.handle(&envelope) else {
        return;
    };
    if let Err(error) = shared.transport.send(&reply) {
        shared.reporter.send_failed(&reply, &error);
    }
}
