//! Process-wide tracing subscriber for the service.
//!
//! The first successful [`initialise`] installs a subscriber built from the
//! configured filter and format; every later call returns the handle
//! describing that installation.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Subscriber, info, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use herald_config::{Config, LogFormat};

const TELEMETRY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::telemetry");

static INSTALLED: OnceCell<TelemetryHandle> = OnceCell::new();

/// Description of the installed subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryHandle {
    format: LogFormat,
    filter: String,
}

impl TelemetryHandle {
    /// Output format of the installed subscriber.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Filter expression the subscriber was built with.
    pub fn filter(&self) -> &str {
        &self.filter
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// The configured log filter does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    Filter {
        /// Offending expression.
        filter: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Another global subscriber is already installed.
    #[error("failed to install telemetry subscriber: {0}")]
    Install(#[source] SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// A service embedded next to other services shares one subscriber; the
/// configuration of the first caller wins.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter and
/// [`TelemetryError::Install`] when a foreign subscriber is already global.
pub fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    INSTALLED
        .get_or_try_init(|| {
            let handle = install(config)?;
            info!(
                target: TELEMETRY_TARGET,
                format = %handle.format,
                filter = handle.filter.as_str(),
                "telemetry initialised"
            );
            Ok(handle)
        })
        .cloned()
}

fn filter_for(expression: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(expression).map_err(|error| TelemetryError::Filter {
        filter: expression.to_owned(),
        message: error.to_string(),
    })
}

fn install(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    let filter = filter_for(config.log_filter())?;
    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(true)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_timer(fmt::time::UtcTime::rfc_3339());

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder.json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder.compact().finish()),
    };
    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Install)?;

    Ok(TelemetryHandle {
        format: config.log_format(),
        filter: config.log_filter().to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn later_calls_report_the_first_installation() {
        let compact = Config {
            log_format: LogFormat::Compact,
            ..Config::default()
        };
        let json = Config {
            log_format: LogFormat::Json,
            log_filter: "debug".to_owned(),
            ..Config::default()
        };

        let first = initialise(&compact).expect("telemetry");
        let second = initialise(&json).expect("telemetry");

        assert_eq!(first, second);
    }

    #[rstest]
    #[case("info")]
    #[case("heraldd=debug,warn")]
    fn valid_filters_parse(#[case] expression: &str) {
        assert!(filter_for(expression).is_ok());
    }

    #[rstest]
    fn invalid_filters_name_the_expression() {
        let Err(error) = filter_for("heraldd=loud") else {
            panic!("filter should be rejected");
        };

        assert!(matches!(&error, TelemetryError::Filter { filter, .. } if filter == "heraldd=loud"));
        assert!(error.to_string().contains("heraldd=loud"));
    }
}
