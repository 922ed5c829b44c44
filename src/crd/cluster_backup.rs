//! ClusterBackup Custom Resource Definition
//!
//! A ClusterBackup is owned by the higher-level coordinator that drives a
//! consistent backup across every XStore member of a cluster. This operator
//! only reads its status.

use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// ClusterBackup resource specification
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "xstore.oso.sh",
    version = "v1alpha1",
    kind = "ClusterBackup",
    plural = "clusterbackups",
    singular = "clusterbackup",
    shortname = "cb",
    namespaced,
    status = "ClusterBackupStatus",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ClusterBackupSpec {
    /// Cluster being backed up
    pub cluster_name: String,

    /// XStore members taking part in the backup
    #[serde(default)]
    pub members: Vec<String>,
}

/// Coordinator phase, in its total order
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq, PartialOrd, Ord,
)]
pub enum ClusterBackupPhase {
    #[default]
    #[serde(alias = "")]
    New,
    Backuping,
    /// Full backups done, binlog offset marker being collected
    Collecting,
    /// Seek-checkpoint job aligning members to a consistent position
    Calculating,
    BinlogBackuping,
    Finished,
    Failed,
}

/// ClusterBackup status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClusterBackupStatus {
    #[serde(default)]
    pub phase: ClusterBackupPhase,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl ClusterBackup {
    pub fn phase(&self) -> ClusterBackupPhase {
        self.status.as_ref().map(|s| s.phase).unwrap_or_default()
    }

    /// The binlog offset marker has been collected from every member
    pub fn binlog_offset_collected(&self) -> bool {
        self.reached(ClusterBackupPhase::Collecting)
    }

    /// The cluster-wide seek-checkpoint job has finished
    pub fn seek_checkpoint_finished(&self) -> bool {
        self.reached(ClusterBackupPhase::BinlogBackuping)
    }

    pub fn is_finished(&self) -> bool {
        self.phase() == ClusterBackupPhase::Finished
    }

    pub fn is_failed(&self) -> bool {
        self.phase() == ClusterBackupPhase::Failed
    }

    fn reached(&self, phase: ClusterBackupPhase) -> bool {
        let current = self.phase();
        current != ClusterBackupPhase::Failed && current >= phase
    }
}
