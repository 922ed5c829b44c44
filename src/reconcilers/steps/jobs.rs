//! Steps launching, awaiting and removing the backup jobs

use async_trait::async_trait;
use tracing::{info, warn};

use crate::adapters::{backup_job, job_name, Applied, JobState};
use crate::control::{BackupContext, Outcome, Step};
use crate::crd::JobKind;
use crate::metrics;

/// Job name for `kind`: the recorded slot if set, otherwise the derived name
fn resolve_job_name(ctx: &BackupContext, kind: JobKind) -> String {
    ctx.status()
        .job_refs
        .get(kind)
        .map(str::to_string)
        .unwrap_or_else(|| job_name(ctx.name(), kind))
}

/// Create the job of `kind` unless it already exists, then record it
pub struct StartJob(pub JobKind);

#[async_trait]
impl Step for StartJob {
    fn name(&self) -> &'static str {
        match self.0 {
            JobKind::FullBackup => "StartFullBackupJob",
            JobKind::CollectBinlog => "StartCollectBinlogJob",
            JobKind::BinlogBackup => "StartBinlogBackupJob",
        }
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        let kind = self.0;
        if ctx.status().job_refs.get(kind).is_some() {
            return Outcome::Continue;
        }

        let job = backup_job(
            ctx.backup(),
            ctx.namespace(),
            kind,
            ctx.config(),
            ctx.owner_reference(),
        );
        let name = job_name(ctx.name(), kind);

        match ctx.control_plane().create_job(ctx.namespace(), job).await {
            Ok(Applied::Created) => {
                info!(name = %ctx.name(), job = %name, kind = %kind, "Created backup job");
                metrics::JOBS_CREATED.with_label_values(&[kind.as_str()]).inc();
            }
            Ok(Applied::Existing) => {
                info!(name = %ctx.name(), job = %name, kind = %kind, "Backup job already exists");
            }
            Err(e) => return Outcome::Fail(e),
        }

        *ctx.status_mut().job_refs.slot_mut(kind) = Some(name);
        Outcome::Continue
    }
}

/// Pause until the job of `kind` reaches a terminal state
pub struct WaitJobFinished(pub JobKind);

#[async_trait]
impl Step for WaitJobFinished {
    fn name(&self) -> &'static str {
        match self.0 {
            JobKind::FullBackup => "WaitFullBackupJobFinished",
            JobKind::CollectBinlog => "WaitCollectBinlogJobFinished",
            JobKind::BinlogBackup => "WaitBinlogBackupJobFinished",
        }
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        let kind = self.0;
        let name = resolve_job_name(ctx, kind);

        let state = match ctx.control_plane().job_state(ctx.namespace(), &name).await {
            Ok(state) => state,
            Err(e) => return Outcome::Fail(e),
        };

        let Some(state) = state else {
            warn!(name = %ctx.name(), job = %name, kind = %kind, "Backup job not found, treating as finished");
            return Outcome::Continue;
        };
        if !state.is_terminal() {
            return Outcome::pause_for(ctx.config().job_poll_interval());
        }

        if state == JobState::Failed {
            warn!(name = %ctx.name(), job = %name, kind = %kind, "Backup job failed");
            ctx.set_condition(
                kind.failed_condition(),
                true,
                "JobFailed",
                format!("Job {} failed", name),
            );
        }
        Outcome::Continue
    }
}

/// Delete the job of `kind` if present and clear its slot
pub struct RemoveJob(pub JobKind);

#[async_trait]
impl Step for RemoveJob {
    fn name(&self) -> &'static str {
        match self.0 {
            JobKind::FullBackup => "RemoveFullBackupJob",
            JobKind::CollectBinlog => "RemoveCollectBinlogJob",
            JobKind::BinlogBackup => "RemoveBinlogBackupJob",
        }
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        let kind = self.0;
        let Some(name) = ctx.status().job_refs.get(kind).map(str::to_string) else {
            return Outcome::Continue;
        };

        match ctx.control_plane().delete_job(ctx.namespace(), &name).await {
            Ok(true) => {
                info!(name = %ctx.name(), job = %name, kind = %kind, "Deleted backup job");
                metrics::JOBS_DELETED.with_label_values(&[kind.as_str()]).inc();
            }
            Ok(false) => {}
            Err(e) => return Outcome::Fail(e),
        }

        *ctx.status_mut().job_refs.slot_mut(kind) = None;
        Outcome::Continue
    }
}
