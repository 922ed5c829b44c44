//! Builders for the Kubernetes objects a backup owns
//!
//! Every name is derived from the backup name so repeated passes address the
//! same objects.

use std::collections::BTreeMap;

use k8s_openapi::api::batch::v1::{Job, JobSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, ConfigMapVolumeSource, Container, PodSpec, PodTemplateSpec, Secret, Volume,
    VolumeMount,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, OwnerReference};
use serde::{Deserialize, Serialize};

use crate::config::OperatorConfig;
use crate::crd::{JobKind, XStoreBackup};
use crate::error::Result;

/// Label carrying the owning backup's name
pub const BACKUP_LABEL: &str = "xstore.oso.sh/backup";
/// Label carrying the backed-up XStore's name
pub const XSTORE_LABEL: &str = "xstore.oso.sh/xstore";
/// Label carrying the job kind
pub const JOB_KIND_LABEL: &str = "xstore.oso.sh/job-kind";

/// Key in the context config map holding [`BackupJobContext`]
pub const CONTEXT_KEY: &str = "backup.json";
/// Key the binlog backup job writes the last captured event time to
pub const LAST_EVENT_TIMESTAMP_KEY: &str = "last-event-timestamp";
/// Mount path of the context config map inside job pods
pub const CONTEXT_MOUNT_PATH: &str = "/etc/xstore-backup";

/// Default storage path prefix
const DEFAULT_PATH_PREFIX: &str = "xstore-backups";

/// Kubernetes object names are limited to 63 characters when used as labels
const MAX_NAME_LEN: usize = 63;

/// Derive a child object name from the backup name
pub fn child_name(backup_name: &str, suffix: &str) -> String {
    let budget = MAX_NAME_LEN.saturating_sub(suffix.len() + 1);
    let base: String = backup_name.chars().take(budget).collect();
    format!("{}-{}", base.trim_end_matches('-'), suffix)
}

pub fn job_name(backup_name: &str, kind: JobKind) -> String {
    child_name(backup_name, kind.name_suffix())
}

pub fn context_config_map_name(backup_name: &str) -> String {
    child_name(backup_name, "context")
}

pub fn secrets_snapshot_name(backup_name: &str) -> String {
    child_name(backup_name, "accounts")
}

/// Storage root for one backup's artifacts
pub fn backup_root_path(backup: &XStoreBackup) -> String {
    let prefix = backup
        .spec
        .storage
        .path_prefix
        .as_deref()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PATH_PREFIX);
    format!(
        "{}/{}/{}",
        prefix, backup.spec.cluster_backup_name, backup.spec.xstore_name
    )
}

/// Parameters handed to every backup job through the context config map
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupJobContext {
    pub backup_name: String,
    pub namespace: String,
    pub xstore_name: String,
    pub cluster_backup_name: String,
    pub storage_provider: String,
    pub storage_sink: String,
    pub backup_root_path: String,
    pub full_backup_path: String,
    pub binlog_backup_path: String,
}

impl BackupJobContext {
    pub fn new(backup: &XStoreBackup, namespace: &str, root_path: &str) -> Self {
        Self {
            backup_name: backup.metadata.name.clone().unwrap_or_default(),
            namespace: namespace.to_string(),
            xstore_name: backup.spec.xstore_name.clone(),
            cluster_backup_name: backup.spec.cluster_backup_name.clone(),
            storage_provider: backup.spec.storage.provider.clone(),
            storage_sink: backup.spec.storage.sink.clone(),
            backup_root_path: root_path.to_string(),
            full_backup_path: format!("{}/full", root_path),
            binlog_backup_path: format!("{}/binlog", root_path),
        }
    }
}

fn labels(backup_name: &str, xstore_name: &str) -> BTreeMap<String, String> {
    BTreeMap::from([
        (BACKUP_LABEL.to_string(), backup_name.to_string()),
        (XSTORE_LABEL.to_string(), xstore_name.to_string()),
        (
            "app.kubernetes.io/managed-by".to_string(),
            "xstore-backup-operator".to_string(),
        ),
    ])
}

fn metadata(
    name: String,
    namespace: &str,
    backup_name: &str,
    xstore_name: &str,
    owner: Option<OwnerReference>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name),
        namespace: Some(namespace.to_string()),
        labels: Some(labels(backup_name, xstore_name)),
        owner_references: owner.map(|o| vec![o]),
        ..Default::default()
    }
}

/// Config map carrying the job context
pub fn context_config_map(
    backup: &XStoreBackup,
    namespace: &str,
    root_path: &str,
    owner: Option<OwnerReference>,
) -> Result<ConfigMap> {
    let backup_name = backup.metadata.name.clone().unwrap_or_default();
    let context = BackupJobContext::new(backup, namespace, root_path);
    Ok(ConfigMap {
        metadata: metadata(
            context_config_map_name(&backup_name),
            namespace,
            &backup_name,
            &backup.spec.xstore_name,
            owner,
        ),
        data: Some(BTreeMap::from([(
            CONTEXT_KEY.to_string(),
            serde_json::to_string_pretty(&context)?,
        )])),
        ..Default::default()
    })
}

fn job_command(kind: JobKind) -> Vec<String> {
    let action = match kind {
        JobKind::FullBackup => "full",
        JobKind::CollectBinlog => "collect-binlog",
        JobKind::BinlogBackup => "binlog",
    };
    vec![
        "xstore-backup".to_string(),
        action.to_string(),
        "--backup-context".to_string(),
        format!("{}/{}", CONTEXT_MOUNT_PATH, CONTEXT_KEY),
    ]
}

/// Job running one stage of the backup
pub fn backup_job(
    backup: &XStoreBackup,
    namespace: &str,
    kind: JobKind,
    config: &OperatorConfig,
    owner: Option<OwnerReference>,
) -> Job {
    let backup_name = backup.metadata.name.clone().unwrap_or_default();
    let mut meta = metadata(
        job_name(&backup_name, kind),
        namespace,
        &backup_name,
        &backup.spec.xstore_name,
        owner,
    );
    meta.labels
        .get_or_insert_with(BTreeMap::new)
        .insert(JOB_KIND_LABEL.to_string(), kind.as_str().to_string());
    let pod_labels = meta.labels.clone();

    let context_volume = "backup-context";
    Job {
        metadata: meta,
        spec: Some(JobSpec {
            backoff_limit: Some(config.job_backoff_limit),
            template: PodTemplateSpec {
                metadata: Some(ObjectMeta {
                    labels: pod_labels,
                    ..Default::default()
                }),
                spec: Some(PodSpec {
                    restart_policy: Some("Never".to_string()),
                    service_account_name: config.job_service_account.clone(),
                    containers: vec![Container {
                        name: kind.as_str().to_string(),
                        image: Some(config.job_image.clone()),
                        command: Some(job_command(kind)),
                        volume_mounts: Some(vec![VolumeMount {
                            name: context_volume.to_string(),
                            mount_path: CONTEXT_MOUNT_PATH.to_string(),
                            ..Default::default()
                        }]),
                        ..Default::default()
                    }],
                    volumes: Some(vec![Volume {
                        name: context_volume.to_string(),
                        config_map: Some(ConfigMapVolumeSource {
                            name: context_config_map_name(&backup_name),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }]),
                    ..Default::default()
                }),
            },
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Copy of the account secret kept alongside the backup
pub fn secrets_snapshot(
    backup: &XStoreBackup,
    namespace: &str,
    source: &Secret,
    owner: Option<OwnerReference>,
) -> Secret {
    let backup_name = backup.metadata.name.clone().unwrap_or_default();
    Secret {
        metadata: metadata(
            secrets_snapshot_name(&backup_name),
            namespace,
            &backup_name,
            &backup.spec.xstore_name,
            owner,
        ),
        data: source.data.clone(),
        string_data: source.string_data.clone(),
        type_: source.type_.clone(),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_names_fit_label_limit() {
        let long = "b".repeat(80);
        let name = job_name(&long, JobKind::CollectBinlog);
        assert_eq!(name.len(), MAX_NAME_LEN);
        assert!(name.ends_with("-collect"));
    }

    #[test]
    fn child_names_are_stable() {
        assert_eq!(job_name("nightly", JobKind::FullBackup), "nightly-full");
        assert_eq!(context_config_map_name("nightly"), "nightly-context");
        assert_eq!(secrets_snapshot_name("nightly"), "nightly-accounts");
    }
}
