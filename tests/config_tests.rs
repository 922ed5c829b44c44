//! Operator configuration loading and validation

use std::io::Write;
use std::time::Duration;

use tokio_test::{assert_err, assert_ok};

use xstore_backup_operator::config::OperatorConfig;

#[test]
fn empty_yaml_yields_defaults() {
    let config = assert_ok!(OperatorConfig::from_yaml("  \n"));
    assert_eq!(config, OperatorConfig::default());
    assert_ok!(config.validate());
}

#[test]
fn partial_yaml_keeps_other_defaults() {
    let config = assert_ok!(OperatorConfig::from_yaml(
        "jobImage: registry.local/backup-tools:1.4\njobPollIntervalSecs: 30\n"
    ));

    assert_eq!(config.job_image, "registry.local/backup-tools:1.4");
    assert_eq!(config.job_poll_interval(), Duration::from_secs(30));
    assert_eq!(config.coordinator_poll_interval(), Duration::from_secs(10));
    assert_eq!(config.metrics_port, 8080);
    assert_eq!(config.field_manager, "xstore-backup-operator");
}

#[test]
fn loads_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "metricsPort: 9102").unwrap();
    writeln!(file, "jobServiceAccount: xstore-backup").unwrap();
    writeln!(file, "defaultPauseSecs: 2").unwrap();

    let config = assert_ok!(OperatorConfig::from_file(file.path()));
    assert_eq!(config.metrics_port, 9102);
    assert_eq!(config.job_service_account.as_deref(), Some("xstore-backup"));
    assert_eq!(config.default_pause(), Duration::from_secs(2));
}

#[test]
fn missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    assert_err!(OperatorConfig::from_file(dir.path().join("absent.yaml")));
}

#[test]
fn malformed_yaml_is_an_error() {
    assert_err!(OperatorConfig::from_yaml("metricsPort: [not, a, port]"));
}

#[test]
fn rejects_unusable_values() {
    let mut config = OperatorConfig::default();
    config.job_image = " ".to_string();
    assert_err!(config.validate());

    let mut config = OperatorConfig::default();
    config.job_poll_interval_secs = 0;
    assert_err!(config.validate());

    let mut config = OperatorConfig::default();
    config.job_backoff_limit = -1;
    assert_err!(config.validate());

    let mut config = OperatorConfig::default();
    config.error_backoff_max_secs = 1;
    assert_err!(config.validate());
}

#[test]
fn error_backoff_doubles_up_to_the_cap() {
    let config = OperatorConfig::default();
    assert_eq!(config.error_backoff(1), Duration::from_secs(5));
    assert_eq!(config.error_backoff(2), Duration::from_secs(10));
    assert_eq!(config.error_backoff(4), Duration::from_secs(40));
    assert_eq!(config.error_backoff(7), Duration::from_secs(300));
    assert_eq!(config.error_backoff(1000), Duration::from_secs(300));
}
