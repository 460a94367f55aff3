//! Service bootstrap orchestration.

use std::sync::Arc;

use ortho_config::{OrthoConfig as _, OrthoError};
use thiserror::Error;

use herald_config::{Config, CredentialError, PasswordDecryptor};

use crate::builtins::register_builtins;
use crate::dispatch::{AlertHandler, ResponseHandler};
use crate::health::HealthReporter;
use crate::lifecycle::{Service, ServiceBuilder};
use crate::registry::{CommandRegistry, RegistryError};
use crate::status::policy_for;
use crate::telemetry::{self, TelemetryError};
use crate::transport::{TransportError, TransportFactory};

/// Trait abstracting configuration loading for testability.
pub trait ConfigLoader: Send + Sync {
    /// Loads the service configuration.
    fn load(&self) -> Result<Config, Arc<OrthoError>>;
}

/// Loader that delegates to [`Config::load`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemConfigLoader;

impl ConfigLoader for SystemConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Config::load()
    }
}

/// Loader that returns a fixed configuration.
#[derive(Debug, Clone)]
pub struct StaticConfigLoader {
    config: Config,
}

impl StaticConfigLoader {
    /// Wraps `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigLoader for StaticConfigLoader {
    fn load(&self) -> Result<Config, Arc<OrthoError>> {
        Ok(self.config.clone())
    }
}

/// Errors surfaced during bootstrap.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// A command could not be registered.
    #[error("failed to register commands: {source}")]
    Registry {
        /// Underlying registry error.
        #[source]
        source: RegistryError,
    },
    /// Configuration failed to load.
    #[error("failed to load configuration: {source}")]
    Configuration {
        /// Underlying loader error.
        #[source]
        source: Arc<OrthoError>,
    },
    /// Telemetry initialisation failed.
    #[error("failed to initialise telemetry: {source}")]
    Telemetry {
        /// Underlying telemetry error.
        #[source]
        source: TelemetryError,
    },
    /// Credentials are missing or unusable.
    #[error("invalid credentials: {source}")]
    Credentials {
        /// Underlying credential error.
        #[source]
        source: CredentialError,
    },
    /// The transport could not be created.
    #[error("failed to create transport: {source}")]
    Transport {
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
}

/// Collaborators supplied to [`bootstrap_with`].
pub struct Collaborators<'a> {
    /// Source of the configuration.
    pub loader: &'a dyn ConfigLoader,
    /// Receiver of health events.
    pub reporter: Arc<dyn HealthReporter>,
    /// Decrypts stored passwords.
    pub decryptor: &'a dyn PasswordDecryptor,
    /// Builds the transport from the credentials.
    pub factory: &'a dyn TransportFactory,
    /// Receives responses to requests the service sends.
    pub responses: Option<Arc<dyn ResponseHandler>>,
    /// Receives inbound alerts.
    pub alerts: Option<Arc<dyn AlertHandler>>,
}

/// Builds a service: built-in commands are registered ahead of `commands`,
/// then configuration is loaded, telemetry initialised, credentials resolved
/// and the transport created.
///
/// The returned service is not started.
pub fn bootstrap_with(
    collaborators: &Collaborators<'_>,
    commands: CommandRegistry,
) -> Result<Service, BootstrapError> {
    let reporter = &collaborators.reporter;
    reporter.bootstrap_starting();
    let fail = |error: BootstrapError| {
        reporter.bootstrap_failed(&error);
        error
    };

    let registry =
        with_builtins(commands).map_err(|source| fail(BootstrapError::Registry { source }))?;
    let config = collaborators
        .loader
        .load()
        .map_err(|source| fail(BootstrapError::Configuration { source }))?;
    telemetry::initialise(&config).map_err(|source| fail(BootstrapError::Telemetry { source }))?;
    let credentials = config
        .credentials(collaborators.decryptor)
        .map_err(|source| fail(BootstrapError::Credentials { source }))?;
    let transport = collaborators
        .factory
        .create(&credentials)
        .map_err(|source| fail(BootstrapError::Transport { source }))?;

    let mut builder = ServiceBuilder::new(
        transport,
        registry,
        config.service_info(credentials.username()),
    )
    .reporter(Arc::clone(reporter))
    .notification_policy(policy_for(config.status_notifications()))
    .contact_domain(credentials.domain())
    .shutdown_timeout(config.shutdown_timeout())
    .request_timeout(config.request_timeout());
    if let Some(handler) = &collaborators.responses {
        builder = builder.response_handler(Arc::clone(handler));
    }
    if let Some(handler) = &collaborators.alerts {
        builder = builder.alert_handler(Arc::clone(handler));
    }
    let service = builder.build();
    reporter.bootstrap_succeeded(&config, credentials.username());
    Ok(service)
}

fn with_builtins(commands: CommandRegistry) -> Result<CommandRegistry, RegistryError> {
    let mut registry = CommandRegistry::new();
    register_builtins(&mut registry)?;
    registry.merge(commands)?;
    Ok(registry)
}
