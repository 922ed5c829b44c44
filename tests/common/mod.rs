//! Shared fixtures for integration tests
//!
//! `FakeControlPlane` keeps every object in memory so a test can run
//! successive passes, flip job and coordinator states in between, and
//! inspect what the operator created.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::ResourceExt;
use parking_lot::Mutex;

use xstore_backup_operator::adapters::{Applied, ControlPlane, JobState};
use xstore_backup_operator::config::OperatorConfig;
use xstore_backup_operator::control::Verdict;
use xstore_backup_operator::crd::{
    BackupStorageSpec, ClusterBackup, ClusterBackupPhase, ClusterBackupSpec, ClusterBackupStatus,
    RetentionPolicy, XStoreBackup, XStoreBackupPhase, XStoreBackupSpec, XStoreBackupStatus,
};
use xstore_backup_operator::error::{Error, Result};
use xstore_backup_operator::reconcilers::xstore_backup;

pub const NAMESPACE: &str = "db";
pub const XSTORE: &str = "orders-dn-0";
pub const CLUSTER_BACKUP: &str = "orders-nightly";

#[derive(Default)]
struct State {
    jobs: BTreeMap<String, (Job, JobState)>,
    config_maps: BTreeMap<String, ConfigMap>,
    secrets: BTreeMap<String, Secret>,
    cluster_backups: BTreeMap<String, ClusterBackup>,
    backups: BTreeMap<String, XStoreBackup>,
    job_creates: HashMap<String, u32>,
    status_patches: u32,
    fail_status_patches: bool,
    fail_job_creates: bool,
}

/// In-memory control plane
#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<State>,
}

impl FakeControlPlane {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Store a backup; one without a resource version starts at "1"
    pub fn insert_backup(&self, mut backup: XStoreBackup) {
        backup
            .metadata
            .resource_version
            .get_or_insert_with(|| "1".to_string());
        self.state.lock().backups.insert(backup.name_any(), backup);
    }

    /// The durable copy of a backup, as the next pass would load it
    pub fn backup(&self, name: &str) -> Option<Arc<XStoreBackup>> {
        self.state.lock().backups.get(name).cloned().map(Arc::new)
    }

    pub fn durable_phase(&self, name: &str) -> XStoreBackupPhase {
        self.backup(name).map(|b| b.phase()).unwrap_or_default()
    }

    pub fn durable_status(&self, name: &str) -> XStoreBackupStatus {
        self.backup(name)
            .and_then(|b| b.status.clone())
            .unwrap_or_default()
    }

    pub fn backup_names(&self) -> Vec<String> {
        self.state.lock().backups.keys().cloned().collect()
    }

    pub fn set_job_state(&self, name: &str, state: JobState) {
        if let Some(entry) = self.state.lock().jobs.get_mut(name) {
            entry.1 = state;
        }
    }

    pub fn remove_job(&self, name: &str) {
        self.state.lock().jobs.remove(name);
    }

    pub fn job_names(&self) -> Vec<String> {
        self.state.lock().jobs.keys().cloned().collect()
    }

    pub fn job(&self, name: &str) -> Option<Job> {
        self.state.lock().jobs.get(name).map(|(job, _)| job.clone())
    }

    pub fn job_creates(&self, name: &str) -> u32 {
        self.state.lock().job_creates.get(name).copied().unwrap_or(0)
    }

    pub fn config_map_names(&self) -> Vec<String> {
        self.state.lock().config_maps.keys().cloned().collect()
    }

    pub fn set_config_map_value(&self, name: &str, key: &str, value: &str) {
        if let Some(cm) = self.state.lock().config_maps.get_mut(name) {
            cm.data
                .get_or_insert_with(BTreeMap::new)
                .insert(key.to_string(), value.to_string());
        }
    }

    pub fn insert_secret(&self, name: &str, data: &[(&str, &str)]) {
        let secret = Secret {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), ByteString(v.as_bytes().to_vec())))
                    .collect(),
            ),
            ..Default::default()
        };
        self.state.lock().secrets.insert(name.to_string(), secret);
    }

    pub fn secret(&self, name: &str) -> Option<Secret> {
        self.state.lock().secrets.get(name).cloned()
    }

    pub fn set_cluster_phase(&self, name: &str, phase: ClusterBackupPhase) {
        let cb = ClusterBackup {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some(NAMESPACE.to_string()),
                ..Default::default()
            },
            spec: ClusterBackupSpec {
                cluster_name: "orders".to_string(),
                members: vec![XSTORE.to_string()],
            },
            status: Some(ClusterBackupStatus {
                phase,
                ..Default::default()
            }),
        };
        self.state.lock().cluster_backups.insert(name.to_string(), cb);
    }

    pub fn status_patches(&self) -> u32 {
        self.state.lock().status_patches
    }

    pub fn fail_status_patches(&self, fail: bool) {
        self.state.lock().fail_status_patches = fail;
    }

    pub fn fail_job_creates(&self, fail: bool) {
        self.state.lock().fail_job_creates = fail;
    }
}

fn injected(what: &str) -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        format!("injected {} failure", what),
    ))
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn create_job(&self, _namespace: &str, job: Job) -> Result<Applied> {
        let mut state = self.state.lock();
        if state.fail_job_creates {
            return Err(injected("job create"));
        }
        let name = job.name_any();
        if state.jobs.contains_key(&name) {
            return Ok(Applied::Existing);
        }
        *state.job_creates.entry(name.clone()).or_insert(0) += 1;
        state.jobs.insert(name, (job, JobState::Running));
        Ok(Applied::Created)
    }

    async fn job_state(&self, _namespace: &str, name: &str) -> Result<Option<JobState>> {
        Ok(self.state.lock().jobs.get(name).map(|(_, s)| *s))
    }

    async fn delete_job(&self, _namespace: &str, name: &str) -> Result<bool> {
        Ok(self.state.lock().jobs.remove(name).is_some())
    }

    async fn create_config_map(&self, _namespace: &str, config_map: ConfigMap) -> Result<Applied> {
        let mut state = self.state.lock();
        let name = config_map.name_any();
        if state.config_maps.contains_key(&name) {
            return Ok(Applied::Existing);
        }
        state.config_maps.insert(name, config_map);
        Ok(Applied::Created)
    }

    async fn get_config_map(&self, _namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self.state.lock().config_maps.get(name).cloned())
    }

    async fn get_secret(&self, _namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.state.lock().secrets.get(name).cloned())
    }

    async fn create_secret(&self, _namespace: &str, secret: Secret) -> Result<Applied> {
        let mut state = self.state.lock();
        let name = secret.name_any();
        if state.secrets.contains_key(&name) {
            return Ok(Applied::Existing);
        }
        state.secrets.insert(name, secret);
        Ok(Applied::Created)
    }

    async fn get_cluster_backup(
        &self,
        _namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterBackup>> {
        Ok(self.state.lock().cluster_backups.get(name).cloned())
    }

    async fn list_backups(&self, _namespace: &str) -> Result<Vec<XStoreBackup>> {
        Ok(self.state.lock().backups.values().cloned().collect())
    }

    async fn delete_backup(&self, _namespace: &str, name: &str) -> Result<bool> {
        Ok(self.state.lock().backups.remove(name).is_some())
    }

    async fn patch_backup_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        _committed: &XStoreBackupStatus,
        status: &XStoreBackupStatus,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_status_patches {
            return Err(injected("status patch"));
        }
        let Some(backup) = state.backups.get_mut(name) else {
            return Ok(());
        };

        let current = backup.metadata.resource_version.clone().unwrap_or_default();
        if resource_version.is_some_and(|rv| rv != current) {
            return Err(Error::StatusConflict(format!("{}/{}", namespace, name)));
        }
        let next = current.parse::<u64>().unwrap_or(0) + 1;
        backup.metadata.resource_version = Some(next.to_string());
        backup.status = Some(status.clone());
        state.status_patches += 1;
        Ok(())
    }
}

pub fn backup_spec() -> XStoreBackupSpec {
    XStoreBackupSpec {
        xstore_name: XSTORE.to_string(),
        cluster_backup_name: CLUSTER_BACKUP.to_string(),
        storage: BackupStorageSpec {
            provider: "s3".to_string(),
            sink: "default".to_string(),
            path_prefix: None,
        },
        account_secret: None,
        retention: None,
    }
}

pub fn new_backup(name: &str) -> XStoreBackup {
    let mut backup = XStoreBackup::new(name, backup_spec());
    backup.metadata.namespace = Some(NAMESPACE.to_string());
    backup.metadata.uid = Some(format!("uid-{}", name));
    backup
}

/// A finished sibling backup that ended at `end_time`
pub fn finished_backup(name: &str, end_time: DateTime<Utc>) -> XStoreBackup {
    let mut backup = new_backup(name);
    backup.status = Some(XStoreBackupStatus {
        phase: XStoreBackupPhase::Finished,
        start_time: Some(end_time),
        end_time: Some(end_time),
        ..Default::default()
    });
    backup
}

pub fn with_retention(mut backup: XStoreBackup, policy: RetentionPolicy) -> XStoreBackup {
    backup.spec.retention = Some(policy);
    backup
}

pub fn test_config() -> Arc<OperatorConfig> {
    Arc::new(OperatorConfig::default())
}

/// Run one pass against the durable copy of `name`, like a fresh process would
pub async fn pass(fake: &Arc<FakeControlPlane>, name: &str) -> Verdict {
    let backup = fake.backup(name).expect("backup exists");
    xstore_backup::reconcile(backup, fake.clone(), test_config()).await
}
