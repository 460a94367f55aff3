//! Routing of inbound envelopes.
//!
//! The [`Dispatcher`] maps each decoded envelope to at most one outbound
//! envelope. It owns no I/O: the lifecycle worker sends whatever it returns.

mod correlation;
mod errors;
mod handlers;
mod router;

pub use self::correlation::{Correlator, PendingRequest};
pub use self::errors::{CommandError, DispatchError};
pub use self::handlers::{
    AlertHandler, CommandContext, CommandHandler, IgnoreAlerts, IgnoreResponses, ResponseHandler,
};
pub use self::router::Dispatcher;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
