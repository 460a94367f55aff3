//! Layered configuration for herald services.
//!
//! Values are merged from defaults, a TOML configuration file, `HERALD_*`
//! environment variables and command-line flags, in increasing order of
//! precedence, via [`ortho_config`]. The logical keys `Credentials.Username`,
//! `Credentials.Password`, `Credentials.Encryption`, `Service.Version` and
//! `Service.About` are exposed as the flat fields `credentials_username`,
//! `credentials_password`, `credentials_encryption`, `service_version` and
//! `service_about`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use herald_types::Identity;

mod credentials;
mod defaults;
mod logging;
mod status;

pub use credentials::{CredentialError, Credentials, PasswordDecryptor, PlaintextOnly};
pub use defaults::{
    DEFAULT_LOG_FILTER, DEFAULT_REQUEST_TIMEOUT_MS, DEFAULT_SERVICE_VERSION,
    DEFAULT_SHUTDOWN_TIMEOUT_MS, default_log_filter_string, default_log_format,
    default_request_timeout_ms, default_service_version, default_shutdown_timeout_ms,
    default_status_notifications,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use status::StatusNotifications;

/// Resolved service configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, OrthoConfig)]
#[ortho_config(prefix = "HERALD")]
pub struct Config {
    /// Account identity used to log in to the transport (`user@domain`).
    #[serde(default)]
    pub credentials_username: Option<String>,
    /// Stored password, possibly encrypted.
    #[serde(default)]
    pub credentials_password: Option<String>,
    /// Encryption scheme applied to the stored password.
    #[serde(default)]
    pub credentials_encryption: Option<String>,
    /// Version reported by the `version` command.
    #[serde(default = "default_service_version")]
    #[ortho_config(default = default_service_version())]
    pub service_version: String,
    /// Description reported by the `about` command.
    #[serde(default)]
    pub service_about: Option<String>,
    /// Which status changes are broadcast to subscribers.
    #[serde(default = "default_status_notifications")]
    #[ortho_config(default = default_status_notifications())]
    pub status_notifications: StatusNotifications,
    /// Bound on waiting for the transport to disconnect during stop.
    #[serde(default = "default_shutdown_timeout_ms")]
    #[ortho_config(default = default_shutdown_timeout_ms())]
    pub shutdown_timeout_ms: u64,
    /// Age after which a request that got no response is forgotten.
    #[serde(default = "default_request_timeout_ms")]
    #[ortho_config(default = default_request_timeout_ms())]
    pub request_timeout_ms: u64,
    /// Tracing filter expression.
    #[serde(default = "default_log_filter_string")]
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[serde(default = "default_log_format")]
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials_username: None,
            credentials_password: None,
            credentials_encryption: None,
            service_version: default_service_version(),
            service_about: None,
            status_notifications: default_status_notifications(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

/// Descriptive metadata reported by the built-in commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    /// Reported version.
    pub version: String,
    /// Reported description.
    pub about: String,
}

impl Config {
    /// Resolves and validates the transport credentials.
    ///
    /// The stored password is passed through `decryptor` unless the
    /// encryption scheme is unset or `none`.
    ///
    /// # Errors
    ///
    /// Returns a [`CredentialError`] when a required value is missing, the
    /// username lacks a domain, or decryption fails.
    pub fn credentials(
        &self,
        decryptor: &dyn PasswordDecryptor,
    ) -> Result<Credentials, CredentialError> {
        credentials::resolve(
            self.credentials_username.as_deref(),
            self.credentials_password.as_deref(),
            self.credentials_encryption.as_deref(),
            decryptor,
        )
    }

    /// Builds the metadata reported by the built-in commands.
    #[must_use]
    pub fn service_info(&self, username: &Identity) -> ServiceInfo {
        let version = self.service_version.trim();
        let version = if version.is_empty() {
            DEFAULT_SERVICE_VERSION
        } else {
            version
        };
        let about = self
            .service_about
            .as_deref()
            .map(str::trim)
            .filter(|about| !about.is_empty())
            .map_or_else(
                || format!("Herald service {username} (version {version})"),
                ToOwned::to_owned,
            );
        ServiceInfo {
            version: version.to_owned(),
            about,
        }
    }

    /// Tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Status notification policy.
    #[must_use]
    pub fn status_notifications(&self) -> StatusNotifications {
        self.status_notifications
    }

    /// Bound on waiting for the transport to disconnect during stop.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// Age after which a request that got no response is forgotten.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
