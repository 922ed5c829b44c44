//! Status persistence, run as every task's finalizer

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::control::{BackupContext, Outcome, Step};
use crate::error::Error;

/// Write the pass's status mutations back in one call.
///
/// Skips the write when nothing changed, so an idle pass does not generate
/// a watch event for its own object. The write is conditional on the
/// resource version the pass loaded; a pass that started from a stale copy
/// fails and is retried against a fresh one.
pub struct PersistStatusChanges;

#[async_trait]
impl Step for PersistStatusChanges {
    fn name(&self) -> &'static str {
        "PersistStatusChanges"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        if !ctx.is_status_changed() {
            debug!(name = %ctx.name(), "Status unchanged, nothing to persist");
            return Outcome::Continue;
        }

        let result = ctx
            .control_plane()
            .patch_backup_status(
                ctx.namespace(),
                ctx.name(),
                ctx.resource_version(),
                ctx.committed_status(),
                ctx.status(),
            )
            .await;

        match result {
            Ok(()) => {
                ctx.mark_committed();
                Outcome::Continue
            }
            Err(e @ Error::StatusConflict(_)) => {
                warn!(name = %ctx.name(), "Backup changed during the pass, discarding its status");
                Outcome::Fail(e)
            }
            Err(e) => Outcome::Fail(e),
        }
    }
}
