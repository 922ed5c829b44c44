//! Operator configuration
//!
//! Loaded from an optional YAML file named by `XSTORE_BACKUP_OPERATOR_CONFIG`,
//! with a handful of environment overrides applied on top.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming the YAML configuration file
pub const CONFIG_PATH_ENV: &str = "XSTORE_BACKUP_OPERATOR_CONFIG";

/// Environment override for the backup job image
pub const JOB_IMAGE_ENV: &str = "XSTORE_BACKUP_JOB_IMAGE";

/// Environment override for the metrics port
pub const METRICS_PORT_ENV: &str = "XSTORE_BACKUP_METRICS_PORT";

/// Operator configuration
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct OperatorConfig {
    /// Image running the backup job tooling
    pub job_image: String,

    /// Service account for backup job pods
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_service_account: Option<String>,

    /// Kubernetes backoffLimit for backup jobs
    pub job_backoff_limit: i32,

    /// How long to wait before re-checking a running job
    pub job_poll_interval_secs: u64,

    /// How long to wait before re-checking the ClusterBackup coordinator
    pub coordinator_poll_interval_secs: u64,

    /// Requeue delay for a paused pass that did not ask for one
    pub default_pause_secs: u64,

    /// First retry delay after a failed reconciliation
    pub error_backoff_base_secs: u64,

    /// Upper bound for the retry delay after repeated failures
    pub error_backoff_max_secs: u64,

    /// Port serving /metrics and health probes
    pub metrics_port: u16,

    /// Field manager used for status patches
    pub field_manager: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            job_image: "ghcr.io/osodevops/xstore-backup-tools:latest".to_string(),
            job_service_account: None,
            job_backoff_limit: 0,
            job_poll_interval_secs: 10,
            coordinator_poll_interval_secs: 10,
            default_pause_secs: 5,
            error_backoff_base_secs: 5,
            error_backoff_max_secs: 300,
            metrics_port: 8080,
            field_manager: "xstore-backup-operator".to_string(),
        }
    }
}

impl OperatorConfig {
    /// Load configuration from the file named in the environment (if any),
    /// then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::from_file(path)?,
            _ => Self::default(),
        };

        if let Ok(image) = std::env::var(JOB_IMAGE_ENV) {
            config.job_image = image;
        }
        if let Ok(port) = std::env::var(METRICS_PORT_ENV) {
            config.metrics_port = port.parse().map_err(|e| {
                Error::config(format!("Invalid {} '{}': {}", METRICS_PORT_ENV, port, e))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Read configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&contents)
    }

    /// Parse configuration from YAML; missing fields take their defaults
    pub fn from_yaml(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(contents)?)
    }

    /// Reject configurations the operator cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.job_image.trim().is_empty() {
            return Err(Error::config("jobImage must not be empty"));
        }
        if self.job_backoff_limit < 0 {
            return Err(Error::config("jobBackoffLimit must not be negative"));
        }
        for (field, value) in [
            ("jobPollIntervalSecs", self.job_poll_interval_secs),
            ("coordinatorPollIntervalSecs", self.coordinator_poll_interval_secs),
            ("defaultPauseSecs", self.default_pause_secs),
            ("errorBackoffBaseSecs", self.error_backoff_base_secs),
        ] {
            if value == 0 {
                return Err(Error::config(format!("{} must be greater than 0", field)));
            }
        }
        if self.error_backoff_max_secs < self.error_backoff_base_secs {
            return Err(Error::config(
                "errorBackoffMaxSecs must not be smaller than errorBackoffBaseSecs",
            ));
        }
        Ok(())
    }

    pub fn job_poll_interval(&self) -> Duration {
        Duration::from_secs(self.job_poll_interval_secs)
    }

    pub fn coordinator_poll_interval(&self) -> Duration {
        Duration::from_secs(self.coordinator_poll_interval_secs)
    }

    pub fn default_pause(&self) -> Duration {
        Duration::from_secs(self.default_pause_secs)
    }

    /// Retry delay after `failures` consecutive failed reconciliations
    pub fn error_backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        let secs = self
            .error_backoff_base_secs
            .saturating_mul(1u64 << exponent)
            .min(self.error_backoff_max_secs);
        Duration::from_secs(secs)
    }
}
