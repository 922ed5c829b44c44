//! Steps waiting on the ClusterBackup coordinator

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::control::{BackupContext, Outcome, Step};
use crate::crd::ClusterBackup;
use crate::error::{Error, Result};

async fn cluster_backup(ctx: &BackupContext) -> Result<ClusterBackup> {
    let name = &ctx.spec().cluster_backup_name;
    ctx.control_plane()
        .get_cluster_backup(ctx.namespace(), name)
        .await?
        .ok_or_else(|| Error::ClusterBackupNotFound(format!("{}/{}", ctx.namespace(), name)))
}

/// Continue once `ready` holds for the coordinator, pause otherwise
async fn wait_for(
    ctx: &BackupContext,
    what: &'static str,
    ready: fn(&ClusterBackup) -> bool,
) -> Outcome {
    let coordinator = match cluster_backup(ctx).await {
        Ok(cb) => cb,
        Err(e) => return Outcome::Fail(e),
    };

    if ready(&coordinator) {
        return Outcome::Continue;
    }
    if coordinator.is_failed() {
        warn!(
            name = %ctx.name(),
            cluster_backup = %ctx.spec().cluster_backup_name,
            "ClusterBackup failed, still waiting for {}", what
        );
    } else {
        debug!(
            name = %ctx.name(),
            cluster_backup_phase = ?coordinator.phase(),
            "Waiting for {}", what
        );
    }
    Outcome::pause_for(ctx.config().coordinator_poll_interval())
}

/// Pause until the coordinator has collected the binlog offset marker
pub struct WaitBinlogOffsetCollected;

#[async_trait]
impl Step for WaitBinlogOffsetCollected {
    fn name(&self) -> &'static str {
        "WaitBinlogOffsetCollected"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        wait_for(ctx, "binlog offset marker", ClusterBackup::binlog_offset_collected).await
    }
}

/// Pause until the cluster-wide seek-checkpoint job has finished
pub struct WaitSeekCheckpointJobFinished;

#[async_trait]
impl Step for WaitSeekCheckpointJobFinished {
    fn name(&self) -> &'static str {
        "WaitSeekCheckpointJobFinished"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        wait_for(ctx, "seek checkpoint job", ClusterBackup::seek_checkpoint_finished).await
    }
}

/// Pause until the coordinator marks the whole cluster backup finished
pub struct WaitClusterBackupFinished;

#[async_trait]
impl Step for WaitClusterBackupFinished {
    fn name(&self) -> &'static str {
        "WaitClusterBackupFinished"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        wait_for(ctx, "cluster backup", ClusterBackup::is_finished).await
    }
}
