//! Shared harness for the service test suites.

use std::ffi::OsString;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use ortho_config::{OrthoConfig as _, OrthoError};

use herald_config::{Config, PlaintextOnly};
use herald_types::{
    Envelope, EnvelopeError, EnvelopeType, Identity, ServiceEvent, Value, ValueMap, fields,
};

use crate::bootstrap::{BootstrapError, Collaborators, ConfigLoader, bootstrap_with};
use crate::directory::BroadcastError;
use crate::dispatch::{CommandContext, CommandError, CommandHandler, PendingRequest, ResponseHandler};
use crate::health::HealthReporter;
use crate::lifecycle::Service;
use crate::registry::{CommandDeclaration, CommandRegistry};
use crate::transport::{ConnectionState, MemoryTransport, MemoryTransportFactory, TransportError};

pub const SERVICE_IDENTITY: &str = "service@example.org";
pub const WAIT_TIMEOUT: Duration = Duration::from_secs(2);
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Polls `condition` until it holds or [`WAIT_TIMEOUT`] elapses.
pub fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT_TIMEOUT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(POLL_INTERVAL);
    }
    condition()
}

/// Configuration with plaintext credentials for [`SERVICE_IDENTITY`].
pub fn test_config() -> Config {
    Config {
        credentials_username: Some(SERVICE_IDENTITY.to_owned()),
        credentials_password: Some("secret".to_owned()),
        service_version: "2.1.0".to_owned(),
        service_about: Some("Test herald".to_owned()),
        shutdown_timeout_ms: 500,
        ..Config::default()
    }
}

/// Loader returning [`test_config`], optionally without credentials.
#[derive(Clone, Copy, Default)]
pub struct TestConfigLoader {
    without_credentials: bool,
}

impl TestConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn without_credentials() -> Self {
        Self {
            without_credentials: true,
        }
    }
}

impl ConfigLoader for TestConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        let mut config = test_config();
        if self.without_credentials {
            config.credentials_username = None;
            config.credentials_password = None;
        }
        Ok(config)
    }
}

/// Loader that fails by passing a malformed CLI value.
pub struct FailingConfigLoader;

impl ConfigLoader for FailingConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load_from_iter([
            OsString::from("heraldd"),
            OsString::from("--shutdown-timeout-ms"),
            OsString::from("soon"),
        ])
    }
}

/// Records health events for assertions.
#[derive(Default)]
pub struct RecordingHealthReporter {
    events: Mutex<Vec<HealthEvent>>,
}

impl RecordingHealthReporter {
    /// Captures a copy of the recorded events.
    pub fn events(&self) -> Vec<HealthEvent> {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .clone()
    }

    fn record(&self, event: HealthEvent) {
        self.events
            .lock()
            .expect("health reporter mutex poisoned")
            .push(event);
    }
}

impl HealthReporter for RecordingHealthReporter {
    fn bootstrap_starting(&self) {
        self.record(HealthEvent::BootstrapStarting);
    }

    fn bootstrap_succeeded(&self, _config: &Config, identity: &Identity) {
        self.record(HealthEvent::BootstrapSucceeded(identity.clone()));
    }

    fn bootstrap_failed(&self, error: &BootstrapError) {
        self.record(HealthEvent::BootstrapFailed(error.to_string()));
    }

    fn connection_state_changed(&self, state: ConnectionState) {
        self.record(HealthEvent::StateChanged(state));
    }

    fn notification_failed(&self, event: ServiceEvent, _error: &BroadcastError) {
        self.record(HealthEvent::NotificationFailed(event));
    }

    fn send_failed(&self, envelope: &Envelope, _error: &TransportError) {
        self.record(HealthEvent::SendFailed(envelope.kind()));
    }

    fn inbound_dropped(&self, from: &str, _error: &EnvelopeError) {
        self.record(HealthEvent::InboundDropped(from.to_owned()));
    }
}

/// Health events tracked during tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthEvent {
    BootstrapStarting,
    BootstrapSucceeded(Identity),
    BootstrapFailed(String),
    StateChanged(ConnectionState),
    NotificationFailed(ServiceEvent),
    SendFailed(EnvelopeType),
    InboundDropped(String),
}

/// Handler echoing its arguments under `Echo`.
pub struct EchoCommand;

impl CommandHandler for EchoCommand {
    fn handle(&self, context: &CommandContext<'_>) -> Result<ValueMap, CommandError> {
        let mut output = ValueMap::new();
        output.insert("Echo", Value::List(context.arguments.to_vec()));
        Ok(output)
    }
}

/// User commands registered by the harness.
pub fn test_commands() -> CommandRegistry {
    let mut registry = CommandRegistry::new();
    registry
        .register(
            CommandDeclaration::new("echo", "Echo the arguments")
                .shortcut("e")
                .handler(EchoCommand),
        )
        .expect("register echo");
    registry
        .register(CommandDeclaration::new("self destruct", "Not today").not_implemented())
        .expect("register self-destruct");
    registry
}

/// Records responses delivered to the response handler.
#[derive(Default)]
pub struct RecordingResponses {
    seen: Mutex<Vec<(Envelope, Option<Envelope>)>>,
}

impl RecordingResponses {
    /// Pairs of response and matched request.
    pub fn seen(&self) -> Vec<(Envelope, Option<Envelope>)> {
        self.seen.lock().expect("responses mutex poisoned").clone()
    }
}

impl ResponseHandler for RecordingResponses {
    fn command_response(
        &self,
        response: &Envelope,
        request: Option<&PendingRequest>,
    ) -> Option<Envelope> {
        self.seen
            .lock()
            .expect("responses mutex poisoned")
            .push((response.clone(), request.map(|pending| pending.request.clone())));
        None
    }
}

/// Bootstrapped service plus the collaborators tests inspect.
pub struct Harness {
    pub service: Service,
    pub transport: Arc<MemoryTransport>,
    pub reporter: Arc<RecordingHealthReporter>,
}

impl Harness {
    /// Bootstraps a service over a memory transport without starting it.
    pub fn bootstrap() -> Result<Self, BootstrapError> {
        Self::bootstrap_from(
            &TestConfigLoader::new(),
            &Arc::new(RecordingHealthReporter::default()),
            None,
        )
    }

    /// Bootstraps with an explicit loader, reporter and response handler.
    pub fn bootstrap_from(
        loader: &dyn ConfigLoader,
        reporter: &Arc<RecordingHealthReporter>,
        responses: Option<Arc<dyn ResponseHandler>>,
    ) -> Result<Self, BootstrapError> {
        let factory = MemoryTransportFactory::new();
        let collaborators = Collaborators {
            loader,
            reporter: reporter.clone(),
            decryptor: &PlaintextOnly,
            factory: &factory,
            responses,
            alerts: None,
        };
        let service = bootstrap_with(&collaborators, test_commands())?;
        let transport = factory.last_created().expect("transport created");
        Ok(Self {
            service,
            transport,
            reporter: Arc::clone(reporter),
        })
    }

    /// Starts the service and waits for the worker to see `Connected`.
    pub fn start(&mut self) {
        self.service.start().expect("service starts");
        assert!(
            self.service
                .wait_for_state(ConnectionState::Connected, WAIT_TIMEOUT),
            "service did not reach the connected state"
        );
    }

    /// Delivers `envelope` to the service as coming from `from`.
    pub fn deliver(&self, from: &str, envelope: &Envelope) {
        self.transport.deliver(from, envelope).expect("deliver");
    }

    /// Waits for an envelope addressed to `target` that satisfies `matches`.
    pub fn wait_for_sent(
        &self,
        target: &str,
        matches: impl Fn(&Envelope) -> bool,
    ) -> Option<Envelope> {
        let mut found = None;
        wait_until(|| {
            found = self
                .sent_to(target)
                .into_iter()
                .find(|envelope| matches(envelope));
            found.is_some()
        });
        found
    }

    /// Envelopes sent to `target` so far.
    pub fn sent_to(&self, target: &str) -> Vec<Envelope> {
        let target = Identity::parse(target).expect("target identity");
        self.transport
            .sent()
            .into_iter()
            .filter(|envelope| {
                envelope
                    .target()
                    .and_then(|raw| Identity::parse(raw).ok())
                    .is_some_and(|sent| sent == target)
            })
            .collect()
    }
}

/// Returns `true` when `envelope` is a notification announcing `event`.
pub fn announces(envelope: &Envelope, event: ServiceEvent) -> bool {
    envelope.kind() == EnvelopeType::Notification
        && envelope.string_value(fields::SERVICE_EVENT) == Some(event.to_string().as_str())
}

/// Strips surrounding double quotes from a step parameter.
pub fn strip_quotes(value: &str) -> &str {
    value.trim_matches('"')
}
