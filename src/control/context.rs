//! Per-pass reconciliation context for one XStoreBackup

use std::sync::Arc;

use chrono::{DateTime, Utc};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::{Resource, ResourceExt};
use tracing::info;

use crate::adapters::ControlPlane;
use crate::config::OperatorConfig;
use crate::crd::{Condition, XStoreBackup, XStoreBackupPhase, XStoreBackupSpec, XStoreBackupStatus};
use crate::error::{Error, Result};

/// Read/write handle to one backup's state during a single pass.
///
/// Status mutations land in a working copy; nothing is visible outside the
/// pass until [`BackupContext::mark_committed`] follows a successful write.
pub struct BackupContext {
    backup: Arc<XStoreBackup>,
    name: String,
    namespace: String,
    committed: XStoreBackupStatus,
    status: XStoreBackupStatus,
    control_plane: Arc<dyn ControlPlane>,
    config: Arc<OperatorConfig>,
    requeue: bool,
}

impl BackupContext {
    pub fn new(
        backup: Arc<XStoreBackup>,
        control_plane: Arc<dyn ControlPlane>,
        config: Arc<OperatorConfig>,
    ) -> Self {
        let name = backup.name_any();
        let namespace = backup.namespace().unwrap_or_else(|| "default".to_string());
        let committed = backup.status.clone().unwrap_or_default();
        Self {
            status: committed.clone(),
            committed,
            backup,
            name,
            namespace,
            control_plane,
            config,
            requeue: false,
        }
    }

    pub fn backup(&self) -> &XStoreBackup {
        &self.backup
    }

    /// Version of the backup this pass was loaded from
    pub fn resource_version(&self) -> Option<&str> {
        self.backup.metadata.resource_version.as_deref()
    }

    pub fn spec(&self) -> &XStoreBackupSpec {
        &self.backup.spec
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn control_plane(&self) -> &dyn ControlPlane {
        self.control_plane.as_ref()
    }

    pub fn config(&self) -> &OperatorConfig {
        &self.config
    }

    /// Owner reference pointing at the backup, for objects it owns
    pub fn owner_reference(&self) -> Option<OwnerReference> {
        self.backup.controller_owner_ref(&())
    }

    /// Working copy of the status
    pub fn status(&self) -> &XStoreBackupStatus {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut XStoreBackupStatus {
        &mut self.status
    }

    /// Status as last committed to the API server
    pub fn committed_status(&self) -> &XStoreBackupStatus {
        &self.committed
    }

    pub fn phase(&self) -> XStoreBackupPhase {
        self.status.phase
    }

    /// Whether the working copy differs from the committed status
    pub fn is_status_changed(&self) -> bool {
        self.status != self.committed
    }

    /// Record that the working copy has been durably written
    pub fn mark_committed(&mut self) {
        self.committed = self.status.clone();
    }

    /// Whether a step asked for the next pass to start immediately
    pub fn requeue_requested(&self) -> bool {
        self.requeue
    }

    pub fn request_requeue(&mut self) {
        self.requeue = true;
    }

    /// Move the backup forward to `phase` and ask for an immediate requeue.
    ///
    /// Phases only move forward; staying in the same phase is a no-op.
    pub fn transition_to(&mut self, phase: XStoreBackupPhase) -> Result<()> {
        let from = self.status.phase;
        if phase < from || phase == XStoreBackupPhase::Unknown {
            return Err(Error::PhaseRegression { from, to: phase });
        }
        if phase == from {
            return Ok(());
        }

        info!(name = %self.name, from = %from, to = %phase, "Phase transition");
        self.status.phase = phase;
        self.status.message = Some(format!("Backup entered phase {}", phase));
        self.request_requeue();
        Ok(())
    }

    /// Record the last captured binlog event time; set once
    pub fn set_last_event_timestamp(&mut self, timestamp: DateTime<Utc>) -> Result<()> {
        write_once(
            &mut self.status.last_event_timestamp,
            timestamp,
            "lastEventTimestamp",
        )
    }

    /// Record the preserved credential secret; set once
    pub fn set_secrets_snapshot_ref(&mut self, name: String) -> Result<()> {
        write_once(&mut self.status.secrets_snapshot_ref, name, "secretsSnapshotRef")
    }

    /// Add or replace a status condition by type
    pub fn set_condition(&mut self, type_: &str, status: bool, reason: &str, message: String) {
        let status = if status { "True" } else { "False" }.to_string();
        let conditions = &mut self.status.conditions;
        if let Some(existing) = conditions.iter_mut().find(|c| c.type_ == type_) {
            if existing.status != status {
                existing.last_transition_time = Utc::now();
            }
            existing.status = status;
            existing.reason = Some(reason.to_string());
            existing.message = Some(message);
            return;
        }
        conditions.push(Condition {
            type_: type_.to_string(),
            status,
            last_transition_time: Utc::now(),
            reason: Some(reason.to_string()),
            message: Some(message),
        });
    }
}

fn write_once<T: PartialEq>(slot: &mut Option<T>, value: T, field: &'static str) -> Result<()> {
    match slot {
        Some(existing) if *existing == value => Ok(()),
        Some(_) => Err(Error::WriteOnce { field }),
        None => {
            *slot = Some(value);
            Ok(())
        }
    }
}
