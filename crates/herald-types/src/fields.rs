//! Logical field names used in envelope payloads.

/// Command token on a [`Command`](crate::EnvelopeType::Command) envelope.
pub const COMMAND: &str = "Command";
/// Argument list on a command envelope.
pub const ARGUMENTS: &str = "Arguments";
/// Canonical command name echoed on a command response.
pub const ORIGINAL_COMMAND: &str = "OriginalCommand";

/// Status code on status responses and status notifications.
pub const STATUS_CODE: &str = "StatusCode";
/// Status message on status responses and status notifications.
pub const STATUS_MESSAGE: &str = "StatusMessage";
/// Status details on status responses and status notifications.
pub const STATUS_DETAILS: &str = "StatusDetails";
/// Server clock (RFC 3339) at the time the envelope was built.
pub const SERVER_TIME: &str = "ServerTime";

/// Event name on notifications.
pub const SERVICE_EVENT: &str = "ServiceEvent";
/// Human-readable description on notifications.
pub const DESCRIPTION: &str = "Description";

/// Failure reason on Error envelopes.
pub const ERROR_MESSAGE: &str = "ErrorMessage";
/// [`ErrorKind`](crate::ErrorKind) tag on Error envelopes.
pub const ERROR_KIND: &str = "ErrorKind";

/// Help table returned by the `help` command.
pub const HELP: &str = "Help";
/// Service description returned by the `about` command.
pub const ABOUT: &str = "About";
/// Service version returned by the `version` command.
pub const VERSION: &str = "Version";
