//! Precedence between configuration files and command-line flags.

use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::time::Duration;

use ortho_config::OrthoConfig as _;
use rstest::{fixture, rstest};
use tempfile::TempDir;

use herald_config::{Config, LogFormat, PlaintextOnly, StatusNotifications};

#[fixture]
fn config_dir() -> TempDir {
    TempDir::new().expect("create temporary directory")
}

fn write_config(dir: &Path, contents: &str) -> OsString {
    let path = dir.join("herald.toml");
    fs::write(&path, contents).expect("write configuration");
    path.into_os_string()
}

fn load(args: Vec<OsString>) -> Config {
    let mut argv = vec![OsString::from("heraldd")];
    argv.extend(args);
    Config::load_from_iter(argv).expect("configuration should load")
}

#[rstest]
fn file_values_are_loaded(config_dir: TempDir) {
    let path = write_config(
        config_dir.path(),
        concat!(
            "credentials_username = \"pump@example.org\"\n",
            "credentials_password = \"secret\"\n",
            "service_version = \"1.4.2\"\n",
            "status_notifications = \"any\"\n",
            "log_format = \"compact\"\n",
            "request_timeout_ms = 5000\n",
        ),
    );

    let config = load(vec![OsString::from("--config-path"), path]);

    assert_eq!(config.service_version, "1.4.2");
    assert_eq!(config.status_notifications(), StatusNotifications::Any);
    assert_eq!(config.log_format(), LogFormat::Compact);
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
    let credentials = config.credentials(&PlaintextOnly).expect("credentials");
    assert_eq!(credentials.username().as_str(), "pump@example.org");
}

#[rstest]
fn cli_flags_override_file_values(config_dir: TempDir) {
    let path = write_config(config_dir.path(), "log_filter = \"warn\"\n");

    let config = load(vec![
        OsString::from("--config-path"),
        path,
        OsString::from("--log-filter"),
        OsString::from("debug"),
    ]);

    assert_eq!(config.log_filter(), "debug");
}

#[rstest]
fn malformed_files_are_rejected(config_dir: TempDir) {
    let path = write_config(config_dir.path(), "shutdown_timeout_ms = \"soon\"\n");

    let result = Config::load_from_iter(vec![
        OsString::from("heraldd"),
        OsString::from("--config-path"),
        path,
    ]);

    assert!(result.is_err(), "malformed configuration should fail");
}
