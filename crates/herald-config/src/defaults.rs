//! Default values shared by the configuration loader and serde.

use crate::logging::LogFormat;
use crate::status::StatusNotifications;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Version reported when `service_version` is not configured.
pub const DEFAULT_SERVICE_VERSION: &str = "0.0.0";

/// Default bound on waiting for the transport to finish disconnecting.
pub const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 10_000;

/// Default age after which an unanswered request is dropped.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Owned log filter value used where allocation is required (e.g. serde).
#[must_use]
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub fn default_log_format() -> LogFormat {
    LogFormat::Json
}

/// Owned default service version.
#[must_use]
pub fn default_service_version() -> String {
    DEFAULT_SERVICE_VERSION.to_owned()
}

/// Default status notification policy.
#[must_use]
pub fn default_status_notifications() -> StatusNotifications {
    StatusNotifications::Code
}

/// Default shutdown wait in milliseconds.
#[must_use]
pub fn default_shutdown_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_MS
}

/// Default request timeout in milliseconds.
#[must_use]
pub fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}
