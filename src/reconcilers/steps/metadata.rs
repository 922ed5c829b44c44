//! Steps recording backup metadata and moving between phases

use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

use crate::adapters::{backup_root_path, context_config_map, context_config_map_name, Applied};
use crate::control::{BackupContext, Outcome, Step};
use crate::crd::XStoreBackupPhase;
use crate::metrics;
use crate::reconcilers::xstore_backup::validate;

/// Reject specs the backup jobs cannot run with
pub struct ValidateSpec;

#[async_trait]
impl Step for ValidateSpec {
    fn name(&self) -> &'static str {
        "ValidateSpec"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        validate(ctx.backup()).into()
    }
}

/// Record when the backup started and where its artifacts go
pub struct UpdateBackupStartInfo;

#[async_trait]
impl Step for UpdateBackupStartInfo {
    fn name(&self) -> &'static str {
        "UpdateBackupStartInfo"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        let root_path = backup_root_path(ctx.backup());
        let status = ctx.status_mut();
        if status.start_time.is_none() {
            status.start_time = Some(Utc::now());
        }
        if status.backup_root_path.is_none() {
            status.backup_root_path = Some(root_path);
        }
        Outcome::Continue
    }
}

/// Create the config map every backup job reads its parameters from
pub struct CreateBackupConfigMap;

#[async_trait]
impl Step for CreateBackupConfigMap {
    fn name(&self) -> &'static str {
        "CreateBackupConfigMap"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        let root_path = ctx
            .status()
            .backup_root_path
            .clone()
            .unwrap_or_else(|| backup_root_path(ctx.backup()));
        let config_map = match context_config_map(
            ctx.backup(),
            ctx.namespace(),
            &root_path,
            ctx.owner_reference(),
        ) {
            Ok(cm) => cm,
            Err(e) => return Outcome::Fail(e),
        };

        match ctx
            .control_plane()
            .create_config_map(ctx.namespace(), config_map)
            .await
        {
            Ok(Applied::Created) => {
                info!(
                    name = %ctx.name(),
                    config_map = %context_config_map_name(ctx.name()),
                    "Created backup context config map"
                );
                Outcome::Continue
            }
            Ok(Applied::Existing) => Outcome::Continue,
            Err(e) => Outcome::Fail(e),
        }
    }
}

/// Move to the next phase once every earlier step in this phase continued
pub struct TransitionTo(pub XStoreBackupPhase);

#[async_trait]
impl Step for TransitionTo {
    fn name(&self) -> &'static str {
        match self.0 {
            XStoreBackupPhase::New => "TransitionToNew",
            XStoreBackupPhase::FullBackuping => "TransitionToFullBackuping",
            XStoreBackupPhase::Collecting => "TransitionToCollecting",
            XStoreBackupPhase::BinlogBackuping => "TransitionToBinlogBackuping",
            XStoreBackupPhase::BinlogWaiting => "TransitionToBinlogWaiting",
            XStoreBackupPhase::Finished => "TransitionToFinished",
            XStoreBackupPhase::Unknown => "TransitionToUnknown",
        }
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        let from = ctx.phase();
        if let Err(e) = ctx.transition_to(self.0) {
            return Outcome::Fail(e);
        }
        if from == self.0 {
            return Outcome::Continue;
        }

        metrics::PHASE_TRANSITIONS
            .with_label_values(&[from.as_str(), self.0.as_str()])
            .inc();

        if self.0 == XStoreBackupPhase::Finished {
            if ctx.status().end_time.is_none() {
                ctx.status_mut().end_time = Some(Utc::now());
            }
            metrics::BACKUPS_FINISHED
                .with_label_values(&[ctx.namespace(), &ctx.spec().xstore_name])
                .inc();
        }
        Outcome::Continue
    }
}
