//! XStoreBackup reconciler
//!
//! Maps every backup phase to the ordered steps run while in it:
//!
//! | Phase           | Steps                                                        |
//! |-----------------|--------------------------------------------------------------|
//! | New             | validate, start info, context config map, full backup job    |
//! | FullBackuping   | wait full backup job                                         |
//! | Collecting      | wait binlog offset, collect binlog job, wait for it          |
//! | BinlogBackuping | wait seek checkpoint, binlog backup job, wait, last event ts |
//! | BinlogWaiting   | wait cluster backup, save secrets                            |
//! | Finished        | remove the three jobs, enforce retention                     |
//!
//! Every non-terminal phase ends with a transition to the next one.

use std::sync::Arc;

use tracing::{info, warn};

use crate::adapters::ControlPlane;
use crate::config::OperatorConfig;
use crate::control::{BackupContext, Executor, Step, Task, Verdict};
use crate::crd::{JobKind, XStoreBackup, XStoreBackupPhase};
use crate::error::{Error, Result};
use crate::reconcilers::steps::*;

const STORAGE_PROVIDERS: [&str; 4] = ["pvc", "s3", "oss", "sftp"];

/// Validate the XStoreBackup spec
pub fn validate(backup: &XStoreBackup) -> Result<()> {
    if backup.spec.xstore_name.trim().is_empty() {
        return Err(Error::validation("xstoreName must be specified"));
    }

    if backup.spec.cluster_backup_name.trim().is_empty() {
        return Err(Error::validation("clusterBackupName must be specified"));
    }

    let provider = backup.spec.storage.provider.as_str();
    if !STORAGE_PROVIDERS.contains(&provider) {
        return Err(Error::validation(format!(
            "Invalid storage provider '{}': must be one of: {}",
            provider,
            STORAGE_PROVIDERS.join(", ")
        )));
    }

    if backup.spec.storage.sink.trim().is_empty() {
        return Err(Error::validation("storage sink must be specified"));
    }

    if let Some(retention) = &backup.spec.retention {
        if retention.max_count == Some(0) {
            return Err(Error::validation("retention maxCount must be at least 1"));
        }
        if retention.max_age_days == Some(0) {
            return Err(Error::validation("retention maxAgeDays must be at least 1"));
        }
    }

    Ok(())
}

static NEW_STEPS: &[&dyn Step] = &[
    &ValidateSpec,
    &UpdateBackupStartInfo,
    &CreateBackupConfigMap,
    &StartJob(JobKind::FullBackup),
    &TransitionTo(XStoreBackupPhase::FullBackuping),
];

static FULL_BACKUPING_STEPS: &[&dyn Step] = &[
    &WaitJobFinished(JobKind::FullBackup),
    &TransitionTo(XStoreBackupPhase::Collecting),
];

static COLLECTING_STEPS: &[&dyn Step] = &[
    &WaitBinlogOffsetCollected,
    &StartJob(JobKind::CollectBinlog),
    &WaitJobFinished(JobKind::CollectBinlog),
    &TransitionTo(XStoreBackupPhase::BinlogBackuping),
];

static BINLOG_BACKUPING_STEPS: &[&dyn Step] = &[
    &WaitSeekCheckpointJobFinished,
    &StartJob(JobKind::BinlogBackup),
    &WaitJobFinished(JobKind::BinlogBackup),
    &ExtractLastEventTimestamp,
    &TransitionTo(XStoreBackupPhase::BinlogWaiting),
];

static BINLOG_WAITING_STEPS: &[&dyn Step] = &[
    &WaitClusterBackupFinished,
    &SaveXStoreSecrets,
    &TransitionTo(XStoreBackupPhase::Finished),
];

static FINISHED_STEPS: &[&dyn Step] = &[
    &RemoveJob(JobKind::FullBackup),
    &RemoveJob(JobKind::CollectBinlog),
    &RemoveJob(JobKind::BinlogBackup),
    &RemoveBackupsOverRetention,
];

static CLEANUP_STEPS: &[&dyn Step] = &[
    &RemoveJob(JobKind::FullBackup),
    &RemoveJob(JobKind::CollectBinlog),
    &RemoveJob(JobKind::BinlogBackup),
];

static PERSIST_STATUS: PersistStatusChanges = PersistStatusChanges;

/// Steps run while in `phase`; `None` for an unrecognized phase
pub fn steps_for(phase: XStoreBackupPhase) -> Option<&'static [&'static dyn Step]> {
    match phase {
        XStoreBackupPhase::New => Some(NEW_STEPS),
        XStoreBackupPhase::FullBackuping => Some(FULL_BACKUPING_STEPS),
        XStoreBackupPhase::Collecting => Some(COLLECTING_STEPS),
        XStoreBackupPhase::BinlogBackuping => Some(BINLOG_BACKUPING_STEPS),
        XStoreBackupPhase::BinlogWaiting => Some(BINLOG_WAITING_STEPS),
        XStoreBackupPhase::Finished => Some(FINISHED_STEPS),
        XStoreBackupPhase::Unknown => None,
    }
}

/// The phase following `phase` in the lifecycle; `None` for Finished
pub fn next_phase(phase: XStoreBackupPhase) -> Option<XStoreBackupPhase> {
    match phase {
        XStoreBackupPhase::New => Some(XStoreBackupPhase::FullBackuping),
        XStoreBackupPhase::FullBackuping => Some(XStoreBackupPhase::Collecting),
        XStoreBackupPhase::Collecting => Some(XStoreBackupPhase::BinlogBackuping),
        XStoreBackupPhase::BinlogBackuping => Some(XStoreBackupPhase::BinlogWaiting),
        XStoreBackupPhase::BinlogWaiting => Some(XStoreBackupPhase::Finished),
        XStoreBackupPhase::Finished | XStoreBackupPhase::Unknown => None,
    }
}

/// Build the task for one pass over a backup in `phase`
pub fn build_task(phase: XStoreBackupPhase) -> Task<'static> {
    let mut task = Task::new();
    task.defer(&PERSIST_STATUS);

    match steps_for(phase) {
        Some(steps) => {
            task.add_steps(steps);
        }
        None => warn!(phase = %phase, "Unrecognized phase"),
    }
    task
}

/// Build the task run when a backup is being deleted
pub fn cleanup_task() -> Task<'static> {
    let mut task = Task::new();
    task.add_steps(CLEANUP_STEPS).defer(&PERSIST_STATUS);
    task
}

/// Run one pass over `backup`
pub async fn reconcile(
    backup: Arc<XStoreBackup>,
    control_plane: Arc<dyn ControlPlane>,
    config: Arc<OperatorConfig>,
) -> Verdict {
    let executor = Executor::new(config.default_pause());
    let mut ctx = BackupContext::new(backup, control_plane, config);
    let phase = ctx.phase();
    let had_jobs = !ctx.committed_status().job_refs.is_empty();

    let task = build_task(phase);
    let verdict = executor.run(&task, &mut ctx).await;

    let cleared = had_jobs && ctx.committed_status().job_refs.is_empty();
    if phase == XStoreBackupPhase::Finished && cleared {
        info!(name = %ctx.name(), "Finished backup, jobs removed");
    }
    verdict
}

/// Remove the jobs of a backup that is being deleted
pub async fn cleanup(
    backup: Arc<XStoreBackup>,
    control_plane: Arc<dyn ControlPlane>,
    config: Arc<OperatorConfig>,
) -> Verdict {
    let executor = Executor::new(config.default_pause());
    let mut ctx = BackupContext::new(backup, control_plane, config);
    executor.run(&cleanup_task(), &mut ctx).await
}
