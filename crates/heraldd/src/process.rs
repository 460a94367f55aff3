//! Runs the service until a shutdown signal arrives.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use herald_config::PlaintextOnly;

use crate::bootstrap::{BootstrapError, Collaborators, SystemConfigLoader, bootstrap_with};
use crate::health::StructuredHealthReporter;
use crate::lifecycle::LifecycleError;
use crate::registry::CommandRegistry;
use crate::shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
use crate::transport::MemoryTransportFactory;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");

/// Errors surfaced while running the service.
#[derive(Debug, Error)]
pub enum LaunchError {
    /// Bootstrap failed.
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),
    /// Starting or stopping failed.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Waiting for the shutdown signal failed.
    #[error(transparent)]
    Shutdown(#[from] ShutdownError),
}

/// Runs the service with the production collaborators over an in-process
/// transport.
pub fn run_service() -> Result<(), LaunchError> {
    let factory = MemoryTransportFactory::new();
    let collaborators = Collaborators {
        loader: &SystemConfigLoader,
        reporter: Arc::new(StructuredHealthReporter::new()),
        decryptor: &PlaintextOnly,
        factory: &factory,
        responses: None,
        alerts: None,
    };
    run_service_with(
        &collaborators,
        CommandRegistry::new(),
        &SystemShutdownSignal::new(),
    )
}

/// Bootstraps and starts the service, waits for `shutdown`, then stops it.
///
/// The service is stopped even when waiting for the signal fails.
pub fn run_service_with(
    collaborators: &Collaborators<'_>,
    commands: CommandRegistry,
    shutdown: &dyn ShutdownSignal,
) -> Result<(), LaunchError> {
    let mut service = bootstrap_with(collaborators, commands)?;
    service.start()?;
    info!(target: PROCESS_TARGET, "service running");

    let waited = shutdown.wait();
    service.stop()?;
    waited?;
    Ok(())
}
