//! Service lifecycle.
//!
//! A [`Service`] ties the transport to the dispatcher. Starting it spawns one
//! dispatch worker, registers a single transport observer that feeds the
//! worker, and connects. Stopping announces `Stopping` to subscribers,
//! disconnects, waits a bounded time for the transport to report
//! `Disconnected`, and then drains and joins the worker.

use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use herald_config::{DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SHUTDOWN_TIMEOUT_MS, ServiceInfo};
use herald_types::{Envelope, EnvelopeId, Identity, ServiceEvent};
use tracing::{debug, info, warn};

use crate::directory::{BroadcastError, Broadcaster, SubscriberDirectory};
use crate::dispatch::{AlertHandler, Correlator, Dispatcher, ResponseHandler};
use crate::health::{HealthReporter, StructuredHealthReporter};
use crate::registry::CommandRegistry;
use crate::status::{CodeChangesOnly, NotificationPolicy, StatusSink, StatusTracker};
use crate::transport::{ConnectionState, Subscription, Transport, TransportError};

mod errors;
mod worker;

pub use self::errors::LifecycleError;
use self::worker::{Forwarder, WorkerHandle};

pub(crate) const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// State shared between the service handle and its worker.
struct Shared {
    transport: Arc<dyn Transport>,
    dispatcher: Dispatcher,
    broadcaster: Arc<Broadcaster>,
    reporter: Arc<dyn HealthReporter>,
    state: Mutex<ConnectionState>,
    state_changed: Condvar,
}

impl Shared {
    fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs the side effects of a transition, then publishes the new state.
    ///
    /// Only the dispatch worker calls this, so waiters never observe a state
    /// whose announcement is still pending.
    fn enter_state(&self, state: ConnectionState) {
        let previous = self.state();
        if previous != state {
            info!(target: LIFECYCLE_TARGET, from = %previous, to = %state, "connection state changed");
            self.reporter.connection_state_changed(state);
            match state {
                ConnectionState::Connected => self.announce(ServiceEvent::Connected),
                ConnectionState::Disconnecting => self.announce(ServiceEvent::Disconnecting),
                ConnectionState::Connecting | ConnectionState::Disconnected => {}
            }
        }

        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.state_changed.notify_all();
    }

    fn announce(&self, event: ServiceEvent) {
        if !self.transport.is_ready_to_send() {
            debug!(target: LIFECYCLE_TARGET, %event, "transport not ready; notification skipped");
            return;
        }
        match self.broadcaster.broadcast(&Envelope::notification(event)) {
            Ok(delivered) => {
                debug!(target: LIFECYCLE_TARGET, %event, delivered, "notification broadcast");
            }
            Err(error) => self.reporter.notification_failed(event, &error),
        }
    }

    fn wait_for(&self, wanted: ConnectionState, timeout: Duration) -> bool {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .state_changed
            .wait_timeout_while(guard, timeout, |current| *current != wanted)
            .unwrap_or_else(PoisonError::into_inner);
        *guard == wanted
    }
}

struct Running {
    worker: WorkerHandle,
    subscription: Subscription,
}

/// Running service handle.
pub struct Service {
    shared: Arc<Shared>,
    directory: Arc<SubscriberDirectory>,
    status: Arc<StatusTracker>,
    service: ServiceInfo,
    shutdown_timeout: Duration,
    request_timeout: Duration,
    running: Option<Running>,
}

impl Service {
    /// Spawns the dispatch worker, registers the transport observer and
    /// connects.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::AlreadyStarted`] on a second call,
    /// [`LifecycleError::Worker`] when the worker cannot be spawned and
    /// [`LifecycleError::Connect`] when the transport refuses to connect.
    pub fn start(&mut self) -> Result<(), LifecycleError> {
        if self.running.is_some() {
            return Err(LifecycleError::AlreadyStarted);
        }

        let (events, inbox) = mpsc::channel();
        let worker = WorkerHandle::spawn(Arc::clone(&self.shared), events.clone(), inbox)?;
        let subscription = self
            .shared
            .transport
            .subscribe(Arc::new(Forwarder::new(events)));

        info!(target: LIFECYCLE_TARGET, "connecting");
        if let Err(source) = self.shared.transport.connect() {
            drop(subscription);
            if let Err(error) = worker.shutdown() {
                warn!(target: LIFECYCLE_TARGET, error = %error, "worker shutdown failed");
            }
            return Err(LifecycleError::Connect { source });
        }
        self.running = Some(Running {
            worker,
            subscription,
        });
        Ok(())
    }

    /// Announces `Stopping`, disconnects and joins the worker.
    ///
    /// The worker is always joined, even when disconnecting fails. Calling
    /// `stop` on a service that is not running does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Disconnect`] when the transport refuses,
    /// [`LifecycleError::DisconnectTimeout`] when it does not report
    /// `Disconnected` within the shutdown timeout, and
    /// [`LifecycleError::WorkerPanic`] when the worker panicked.
    pub fn stop(&mut self) -> Result<(), LifecycleError> {
        let Some(running) = self.running.take() else {
            return Ok(());
        };

        info!(target: LIFECYCLE_TARGET, "stopping");
        self.shared.announce(ServiceEvent::Stopping);
        let disconnected = self
            .shared
            .transport
            .disconnect()
            .map_err(|source| LifecycleError::Disconnect { source })
            .and_then(|()| {
                if self
                    .shared
                    .wait_for(ConnectionState::Disconnected, self.shutdown_timeout)
                {
                    Ok(())
                } else {
                    Err(LifecycleError::DisconnectTimeout {
                        timeout: self.shutdown_timeout,
                    })
                }
            });

        let Running {
            worker,
            subscription,
        } = running;
        drop(subscription);
        let joined = worker.shutdown();
        info!(target: LIFECYCLE_TARGET, "stopped");
        disconnected.and(joined)
    }

    /// Returns `true` between a successful `start` and `stop`.
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Last connection state processed by the worker.
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    /// Blocks until the worker has processed `state` or `timeout` elapses.
    pub fn wait_for_state(&self, state: ConnectionState, timeout: Duration) -> bool {
        self.shared.wait_for(state, timeout)
    }

    /// Service status.
    pub fn status(&self) -> &Arc<StatusTracker> {
        &self.status
    }

    /// Notification subscribers.
    pub fn directory(&self) -> &Arc<SubscriberDirectory> {
        &self.directory
    }

    /// Registered commands.
    pub fn registry(&self) -> &CommandRegistry {
        self.shared.dispatcher.registry()
    }

    /// Requests awaiting responses.
    pub fn correlator(&self) -> &Arc<Correlator> {
        self.shared.dispatcher.correlator()
    }

    /// Metadata reported by the built-in commands.
    pub fn info(&self) -> &ServiceInfo {
        &self.service
    }

    /// Sends an envelope through the transport.
    ///
    /// # Errors
    ///
    /// Returns the transport's error unchanged.
    pub fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        self.shared.transport.send(envelope)
    }

    /// Sends a request and remembers it so the matching `CommandResponse`
    /// reaches the response handler together with the request.
    ///
    /// Requests older than the request timeout are dropped first, so
    /// unanswered requests do not accumulate.
    ///
    /// # Errors
    ///
    /// Returns the transport's error; the request is then forgotten.
    pub fn send_request(&self, request: &Envelope) -> Result<EnvelopeId, TransportError> {
        let correlator = self.correlator();
        let expired = correlator.expire(self.request_timeout);
        if expired > 0 {
            debug!(target: LIFECYCLE_TARGET, expired, "unanswered requests expired");
        }
        correlator.track(request);
        if let Err(error) = self.shared.transport.send(request) {
            correlator.forget(request.id());
            return Err(error);
        }
        Ok(request.id().clone())
    }

    /// Sends a copy of `template` to every subscriber.
    ///
    /// # Errors
    ///
    /// See [`Broadcaster::broadcast`].
    pub fn broadcast(&self, template: &Envelope) -> Result<usize, BroadcastError> {
        self.shared.broadcaster.broadcast(template)
    }

    /// Adds a contact to the transport and subscribes it to notifications.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidContact`] when `raw` is not an
    /// identity and [`LifecycleError::Contact`] when the transport refuses.
    pub fn add_contact(&self, raw: &str) -> Result<Identity, LifecycleError> {
        let identity = self.directory.canonical(raw)?;
        self.shared
            .transport
            .add_contact(&identity)
            .map_err(|source| LifecycleError::Contact { source })?;
        self.directory.add(identity.clone());
        Ok(identity)
    }
}

impl Drop for Service {
    fn drop(&mut self) {
        let Some(Running {
            worker,
            subscription,
        }) = self.running.take()
        else {
            return;
        };
        drop(subscription);
        if let Err(error) = worker.shutdown() {
            warn!(target: LIFECYCLE_TARGET, error = %error, "worker shutdown failed");
        }
    }
}

/// Assembles a [`Service`].
///
/// The registry is used as given; call
/// [`register_builtins`](crate::register_builtins) first to get the standard
/// commands.
pub struct ServiceBuilder {
    transport: Arc<dyn Transport>,
    registry: CommandRegistry,
    service: ServiceInfo,
    reporter: Arc<dyn HealthReporter>,
    policy: Arc<dyn NotificationPolicy>,
    responses: Option<Arc<dyn ResponseHandler>>,
    alerts: Option<Arc<dyn AlertHandler>>,
    contact_domain: Option<String>,
    shutdown_timeout: Duration,
    request_timeout: Duration,
}

impl ServiceBuilder {
    /// Starts a builder with structured health reporting, code-only status
    /// notifications and the default timeouts.
    pub fn new(transport: Arc<dyn Transport>, registry: CommandRegistry, service: ServiceInfo) -> Self {
        Self {
            transport,
            registry,
            service,
            reporter: Arc::new(StructuredHealthReporter::new()),
            policy: Arc::new(CodeChangesOnly),
            responses: None,
            alerts: None,
            contact_domain: None,
            shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
            request_timeout: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
        }
    }

    /// Sets the health reporter.
    #[must_use]
    pub fn reporter(mut self, reporter: Arc<dyn HealthReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Sets the status notification policy.
    #[must_use]
    pub fn notification_policy(mut self, policy: Arc<dyn NotificationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the handler for responses to this service's requests.
    #[must_use]
    pub fn response_handler(mut self, handler: Arc<dyn ResponseHandler>) -> Self {
        self.responses = Some(handler);
        self
    }

    /// Sets the handler for inbound alerts.
    #[must_use]
    pub fn alert_handler(mut self, handler: Arc<dyn AlertHandler>) -> Self {
        self.alerts = Some(handler);
        self
    }

    /// Sets the domain that qualifies bare subscriber identities.
    #[must_use]
    pub fn contact_domain(mut self, domain: impl Into<String>) -> Self {
        self.contact_domain = Some(domain.into());
        self
    }

    /// Sets how long `stop` waits for the transport to disconnect.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets how long a sent request waits for its response before it is
    /// dropped.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Builds the service; nothing is connected until [`Service::start`].
    pub fn build(self) -> Service {
        let directory = Arc::new(match self.contact_domain {
            Some(domain) => SubscriberDirectory::with_domain(domain),
            None => SubscriberDirectory::new(),
        });
        let broadcaster = Arc::new(Broadcaster::new(
            Arc::clone(&self.transport),
            Arc::clone(&directory),
        ));
        let sink: Arc<dyn StatusSink> = broadcaster.clone();
        let status = Arc::new(StatusTracker::new(sink, self.policy));

        let mut dispatcher = Dispatcher::new(
            Arc::new(self.registry),
            Arc::clone(&directory),
            Arc::clone(&status),
            self.service.clone(),
        );
        if let Some(handler) = self.responses {
            dispatcher = dispatcher.with_response_handler(handler);
        }
        if let Some(handler) = self.alerts {
            dispatcher = dispatcher.with_alert_handler(handler);
        }

        Service {
            shared: Arc::new(Shared {
                transport: self.transport,
                dispatcher,
                broadcaster,
                reporter: self.reporter,
                state: Mutex::new(ConnectionState::Disconnected),
                state_changed: Condvar::new(),
            }),
            directory,
            status,
            service: self.service,
            shutdown_timeout: self.shutdown_timeout,
            request_timeout: self.request_timeout,
            running: None,
        }
    }
}
