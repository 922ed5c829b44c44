//! The cluster control plane as seen by backup steps
//!
//! Steps never talk to the API server directly; they go through
//! [`ControlPlane`], which exposes only create-if-absent, delete-if-present
//! and read operations keyed by stable names.

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};

use crate::crd::{ClusterBackup, XStoreBackup, XStoreBackupStatus};
use crate::error::Result;

/// Result of a create-if-absent call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Applied {
    /// The object was created by this call
    Created,
    /// An object with the same name already existed
    Existing,
}

/// Terminal state of a job as far as backups are concerned
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobState {
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }

    /// Derive the state from a Job's status conditions and counters
    pub fn of(job: &Job) -> Self {
        let Some(status) = &job.status else {
            return JobState::Running;
        };
        let condition_true = |type_: &str| {
            status
                .conditions
                .as_ref()
                .map(|conds| {
                    conds
                        .iter()
                        .any(|c| c.type_ == type_ && c.status == "True")
                })
                .unwrap_or(false)
        };

        if condition_true("Complete") || status.succeeded.unwrap_or(0) > 0 {
            JobState::Succeeded
        } else if condition_true("Failed") {
            JobState::Failed
        } else {
            JobState::Running
        }
    }
}

/// Side-resource operations needed by backup steps
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Create a job unless one with the same name exists
    async fn create_job(&self, namespace: &str, job: Job) -> Result<Applied>;

    /// State of a job, `None` if it does not exist
    async fn job_state(&self, namespace: &str, name: &str) -> Result<Option<JobState>>;

    /// Delete a job and its pods; returns false if it was already gone
    async fn delete_job(&self, namespace: &str, name: &str) -> Result<bool>;

    /// Create a config map unless one with the same name exists
    async fn create_config_map(&self, namespace: &str, config_map: ConfigMap) -> Result<Applied>;

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>>;

    /// Create a secret unless one with the same name exists
    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Applied>;

    async fn get_cluster_backup(&self, namespace: &str, name: &str)
        -> Result<Option<ClusterBackup>>;

    /// All backups in a namespace
    async fn list_backups(&self, namespace: &str) -> Result<Vec<XStoreBackup>>;

    /// Delete a backup; returns false if it was already gone
    async fn delete_backup(&self, namespace: &str, name: &str) -> Result<bool>;

    /// Durably replace a backup's status; `committed` is the status the
    /// pass started from. With a `resource_version` the write fails with
    /// [`Error::StatusConflict`](crate::error::Error::StatusConflict) if the
    /// backup changed since that version.
    async fn patch_backup_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        committed: &XStoreBackupStatus,
        status: &XStoreBackupStatus,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::batch::v1::{JobCondition, JobStatus};

    fn job_with(status: Option<JobStatus>) -> Job {
        Job {
            status,
            ..Default::default()
        }
    }

    fn condition(type_: &str, status: &str) -> JobCondition {
        JobCondition {
            type_: type_.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn job_without_status_is_running() {
        assert_eq!(JobState::of(&job_with(None)), JobState::Running);
        assert_eq!(
            JobState::of(&job_with(Some(JobStatus::default()))),
            JobState::Running
        );
    }

    #[test]
    fn complete_condition_means_succeeded() {
        let job = job_with(Some(JobStatus {
            conditions: Some(vec![condition("Complete", "True")]),
            ..Default::default()
        }));
        assert_eq!(JobState::of(&job), JobState::Succeeded);
        assert!(JobState::of(&job).is_terminal());
    }

    #[test]
    fn failed_condition_means_failed() {
        let job = job_with(Some(JobStatus {
            failed: Some(1),
            conditions: Some(vec![condition("Failed", "True")]),
            ..Default::default()
        }));
        assert_eq!(JobState::of(&job), JobState::Failed);
        assert!(JobState::of(&job).is_terminal());
    }

    #[test]
    fn succeeded_pod_count_without_conditions_means_succeeded() {
        let job = job_with(Some(JobStatus {
            succeeded: Some(1),
            ..Default::default()
        }));
        assert_eq!(JobState::of(&job), JobState::Succeeded);
    }

    #[test]
    fn conditions_that_are_not_true_keep_the_job_running() {
        let job = job_with(Some(JobStatus {
            active: Some(1),
            conditions: Some(vec![
                condition("Complete", "False"),
                condition("Failed", "Unknown"),
                condition("Suspended", "True"),
            ]),
            ..Default::default()
        }));
        assert_eq!(JobState::of(&job), JobState::Running);
        assert!(!JobState::of(&job).is_terminal());
    }
}
