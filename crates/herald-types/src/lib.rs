//! Envelope data model shared by herald services and their clients.
//!
//! An [`Envelope`] is the unit exchanged over the pub-sub transport. It
//! carries an [`EnvelopeType`], correlation metadata (`ID`/`ResponseID`),
//! routing identities and a payload of [`Value`]s. The wire encoding is JSON
//! with the field names used by existing clients (`Type`, `SubType`, `ID`,
//! `ResponseID`, `Sender`, `Target`, `Tag`, `Values`).
//!
//! ```text
//! {"Type":"Command","SubType":0,"ID":"…","Sender":"ops@example.org",
//!  "Values":{"Command":"status"}}
//! ```

mod command;
mod envelope;
mod errors;
pub mod fields;
mod identity;
mod kind;
mod value;

pub use command::{argument, argument_or};
pub use envelope::{Envelope, EnvelopeId};
pub use errors::EnvelopeError;
pub use identity::Identity;
pub use kind::{EnvelopeType, ErrorKind, ServiceEvent};
pub use value::{Value, ValueMap};
