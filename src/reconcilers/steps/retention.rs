//! Retention enforcement over sibling backups

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use kube::ResourceExt;
use tracing::{info, warn};

use crate::control::{BackupContext, Outcome, Step};
use crate::crd::{RetentionPolicy, XStoreBackup, XStoreBackupPhase};
use crate::metrics;

fn completed_at(backup: &XStoreBackup) -> Option<DateTime<Utc>> {
    backup
        .status
        .as_ref()
        .and_then(|s| s.end_time.or(s.start_time))
}

/// Names of sibling backups that fall outside `policy`.
///
/// Finished backups of the same XStore that are not already being deleted are
/// ranked newest first, `current` included. Those ranked beyond `maxCount` or
/// completed before the age cutoff are selected, except `current` itself and
/// anything completed after it.
pub fn select_over_retention(
    policy: &RetentionPolicy,
    now: DateTime<Utc>,
    current: &XStoreBackup,
    backups: &[XStoreBackup],
) -> Vec<String> {
    let current_name = current.name_any();
    let current_at = completed_at(current);

    let mut ranked: Vec<&XStoreBackup> = backups
        .iter()
        .filter(|b| b.spec.xstore_name == current.spec.xstore_name)
        .filter(|b| b.name_any() != current_name)
        .filter(|b| b.phase() == XStoreBackupPhase::Finished)
        .filter(|b| b.metadata.deletion_timestamp.is_none())
        .collect();
    ranked.push(current);

    // Newest first; backups without any timestamp sort last, ties by name
    ranked.sort_by(|a, b| {
        completed_at(b)
            .cmp(&completed_at(a))
            .then_with(|| a.name_any().cmp(&b.name_any()))
    });

    let keep = policy
        .max_count
        .map(|n| n.max(1) as usize)
        .unwrap_or(usize::MAX);
    let cutoff = policy
        .max_age_days
        .map(|days| now - Duration::days(i64::from(days)));

    ranked
        .into_iter()
        .enumerate()
        .filter(|(_, backup)| backup.name_any() != current_name)
        .filter(|(_, backup)| completed_at(backup) <= current_at)
        .filter(|(index, backup)| {
            let over_count = *index >= keep;
            let over_age = match (cutoff, completed_at(backup)) {
                (Some(cutoff), Some(at)) => at < cutoff,
                _ => false,
            };
            over_count || over_age
        })
        .map(|(_, backup)| backup.name_any())
        .collect()
}

/// Delete sibling backups beyond the retention policy
pub struct RemoveBackupsOverRetention;

#[async_trait]
impl Step for RemoveBackupsOverRetention {
    fn name(&self) -> &'static str {
        "RemoveBackupsOverRetention"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        let Some(policy) = ctx.spec().retention.clone() else {
            return Outcome::Continue;
        };

        let backups = match ctx.control_plane().list_backups(ctx.namespace()).await {
            Ok(list) => list,
            Err(e) => return Outcome::Fail(e),
        };

        let victims = select_over_retention(&policy, Utc::now(), ctx.backup(), &backups);
        for victim in victims {
            match ctx.control_plane().delete_backup(ctx.namespace(), &victim).await {
                Ok(true) => {
                    info!(name = %ctx.name(), deleted = %victim, "Deleted backup over retention");
                    metrics::RETENTION_DELETIONS
                        .with_label_values(&[ctx.namespace(), &ctx.spec().xstore_name])
                        .inc();
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(name = %ctx.name(), backup = %victim, error = %e, "Failed to delete backup over retention");
                    return Outcome::Fail(e);
                }
            }
        }
        Outcome::Continue
    }
}
