//! XStoreBackup Custom Resource Definition

use std::fmt;

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// XStoreBackup resource specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "xstore.oso.sh",
    version = "v1alpha1",
    kind = "XStoreBackup",
    plural = "xstorebackups",
    singular = "xstorebackup",
    shortname = "xsb",
    namespaced,
    status = "XStoreBackupStatus",
    printcolumn = r#"{"name": "XStore", "type": "string", "jsonPath": ".spec.xstoreName"}"#,
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Start", "type": "string", "jsonPath": ".status.startTime"}"#,
    printcolumn = r#"{"name": "End", "type": "string", "jsonPath": ".status.endTime"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct XStoreBackupSpec {
    /// Name of the XStore cluster to back up
    pub xstore_name: String,

    /// Name of the ClusterBackup coordinating all members of this backup
    pub cluster_backup_name: String,

    /// Where backup artifacts are written
    pub storage: BackupStorageSpec,

    /// Secret holding the account credentials to preserve (defaults to xstoreName)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_secret: Option<String>,

    /// Retention policy applied to sibling backups of the same XStore
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retention: Option<RetentionPolicy>,
}

/// Backup storage specification
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupStorageSpec {
    /// Storage provider (pvc, s3, oss, sftp)
    pub provider: String,

    /// Named sink configured for the provider
    pub sink: String,

    /// Path prefix for backup artifacts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
}

/// Retention policy for completed backups
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    /// Maximum number of finished backups kept per XStore, this one included
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,

    /// Maximum age in days of finished backups
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_age_days: Option<u32>,
}

/// Backup lifecycle phase, in its total order
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
pub enum XStoreBackupPhase {
    #[default]
    #[serde(alias = "")]
    New,
    FullBackuping,
    Collecting,
    BinlogBackuping,
    BinlogWaiting,
    Finished,
    /// Any value this operator does not recognize
    #[serde(other)]
    Unknown,
}

impl XStoreBackupPhase {
    /// Every recognized phase, in lifecycle order
    pub const ALL: [XStoreBackupPhase; 6] = [
        XStoreBackupPhase::New,
        XStoreBackupPhase::FullBackuping,
        XStoreBackupPhase::Collecting,
        XStoreBackupPhase::BinlogBackuping,
        XStoreBackupPhase::BinlogWaiting,
        XStoreBackupPhase::Finished,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            XStoreBackupPhase::New => "New",
            XStoreBackupPhase::FullBackuping => "FullBackuping",
            XStoreBackupPhase::Collecting => "Collecting",
            XStoreBackupPhase::BinlogBackuping => "BinlogBackuping",
            XStoreBackupPhase::BinlogWaiting => "BinlogWaiting",
            XStoreBackupPhase::Finished => "Finished",
            XStoreBackupPhase::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for XStoreBackupPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Names of the transient jobs created for a backup
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackupJobRefs {
    /// Full snapshot job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_backup: Option<String>,

    /// Binlog position collect job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collect_binlog: Option<String>,

    /// Binlog capture job
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binlog_backup: Option<String>,
}

impl BackupJobRefs {
    pub fn is_empty(&self) -> bool {
        self.full_backup.is_none() && self.collect_binlog.is_none() && self.binlog_backup.is_none()
    }

    pub fn get(&self, kind: JobKind) -> Option<&str> {
        match kind {
            JobKind::FullBackup => self.full_backup.as_deref(),
            JobKind::CollectBinlog => self.collect_binlog.as_deref(),
            JobKind::BinlogBackup => self.binlog_backup.as_deref(),
        }
    }

    pub fn slot_mut(&mut self, kind: JobKind) -> &mut Option<String> {
        match kind {
            JobKind::FullBackup => &mut self.full_backup,
            JobKind::CollectBinlog => &mut self.collect_binlog,
            JobKind::BinlogBackup => &mut self.binlog_backup,
        }
    }
}

/// The transient jobs a backup runs
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum JobKind {
    /// Full data snapshot
    FullBackup,
    /// Records the binlog position reached by the full snapshot
    CollectBinlog,
    /// Captures binlog events up to the consistent point
    BinlogBackup,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::FullBackup, JobKind::CollectBinlog, JobKind::BinlogBackup];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::FullBackup => "full-backup",
            JobKind::CollectBinlog => "collect-binlog",
            JobKind::BinlogBackup => "binlog-backup",
        }
    }

    /// Suffix appended to the backup name to form the job name
    pub fn name_suffix(&self) -> &'static str {
        match self {
            JobKind::FullBackup => "full",
            JobKind::CollectBinlog => "collect",
            JobKind::BinlogBackup => "binlog",
        }
    }

    /// Condition type recorded when a job of this kind fails
    pub fn failed_condition(&self) -> &'static str {
        match self {
            JobKind::FullBackup => "FullBackupJobFailed",
            JobKind::CollectBinlog => "CollectBinlogJobFailed",
            JobKind::BinlogBackup => "BinlogBackupJobFailed",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// XStoreBackup status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct XStoreBackupStatus {
    /// Current phase
    #[serde(default)]
    pub phase: XStoreBackupPhase,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// When the backup started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    /// When the backup finished
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Timestamp of the last captured binlog event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_event_timestamp: Option<DateTime<Utc>>,

    /// Root path of this backup's artifacts in storage
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_root_path: Option<String>,

    /// Jobs created for this backup and not yet cleaned up
    #[serde(default, skip_serializing_if = "BackupJobRefs::is_empty")]
    pub job_refs: BackupJobRefs,

    /// Secret preserving the credentials needed to restore this backup
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secrets_snapshot_ref: Option<String>,

    /// Status conditions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// Status condition
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    /// Condition type
    #[serde(rename = "type")]
    pub type_: String,

    /// Status (True, False, Unknown)
    pub status: String,

    /// Last transition time
    pub last_transition_time: DateTime<Utc>,

    /// Reason for the condition
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl XStoreBackup {
    /// Current phase, treating a missing status as New
    pub fn phase(&self) -> XStoreBackupPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// Secret whose credentials are preserved with this backup
    pub fn account_secret_name(&self) -> &str {
        self.spec
            .account_secret
            .as_deref()
            .unwrap_or(&self.spec.xstore_name)
    }
}
