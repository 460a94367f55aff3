//! Command and notification service over a pub-sub transport.
//!
//! A service receives [`Envelope`](herald_types::Envelope)s through a
//! [`Transport`], dispatches commands to registered handlers, answers pings
//! and status requests, keeps a directory of subscribers, and broadcasts
//! lifecycle and status notifications to them.
//!
//! [`bootstrap_with`] wires a service from configuration; [`Service::start`]
//! connects it and [`Service::stop`] shuts it down in order. All inbound
//! traffic is handled on a single dispatch worker thread.

mod bootstrap;
mod builtins;
mod directory;
mod dispatch;
mod health;
mod lifecycle;
mod process;
mod registry;
mod shutdown;
mod status;
mod telemetry;
mod transport;

pub use bootstrap::{
    BootstrapError, Collaborators, ConfigLoader, StaticConfigLoader, SystemConfigLoader,
    bootstrap_with,
};
pub use builtins::register_builtins;
pub use directory::{BroadcastError, Broadcaster, SubscriberDirectory};
pub use dispatch::{
    AlertHandler, CommandContext, CommandError, CommandHandler, Correlator, DispatchError,
    Dispatcher, IgnoreAlerts, IgnoreResponses, PendingRequest, ResponseHandler,
};
pub use health::{HealthReporter, StructuredHealthReporter};
pub use lifecycle::{LifecycleError, Service, ServiceBuilder};
pub use process::{LaunchError, run_service, run_service_with};
pub use registry::{
    CommandDeclaration, CommandRegistry, HelpEntry, RegisteredCommand, RegistryError,
    ServiceCommand, sanitize,
};
pub use shutdown::{ShutdownError, ShutdownSignal, SystemShutdownSignal};
pub use status::{
    AnyChange, CodeChangesOnly, NotificationPolicy, StatusChange, StatusObserver, StatusSink,
    StatusSnapshot, StatusTracker, policy_for,
};
pub use telemetry::{TelemetryError, TelemetryHandle};
pub use transport::{
    ConnectionState, MESSAGE_SUBJECT, MemoryTransport, MemoryTransportFactory, ObserverSet,
    RawMessage, Subscription, Transport, TransportError, TransportFactory, TransportObserver,
    decode_inbound,
};

#[cfg(test)]
mod tests;
