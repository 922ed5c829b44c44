//! Preservation of the credentials needed to restore a backup

use async_trait::async_trait;
use tracing::info;

use crate::adapters::{secrets_snapshot, secrets_snapshot_name, Applied};
use crate::control::{BackupContext, Outcome, Step};
use crate::error::Error;

/// Copy the XStore account secret into a secret owned by the backup
pub struct SaveXStoreSecrets;

#[async_trait]
impl Step for SaveXStoreSecrets {
    fn name(&self) -> &'static str {
        "SaveXStoreSecrets"
    }

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome {
        if ctx.status().secrets_snapshot_ref.is_some() {
            return Outcome::Continue;
        }

        let source_name = ctx.backup().account_secret_name().to_string();
        let source = match ctx
            .control_plane()
            .get_secret(ctx.namespace(), &source_name)
            .await
        {
            Ok(Some(secret)) => secret,
            Ok(None) => {
                return Outcome::fail(Error::SecretNotFound(format!(
                    "{}/{}",
                    ctx.namespace(),
                    source_name
                )))
            }
            Err(e) => return Outcome::Fail(e),
        };

        let snapshot = secrets_snapshot(ctx.backup(), ctx.namespace(), &source, ctx.owner_reference());
        let snapshot_name = secrets_snapshot_name(ctx.name());
        match ctx.control_plane().create_secret(ctx.namespace(), snapshot).await {
            Ok(Applied::Created) => {
                info!(
                    name = %ctx.name(),
                    source = %source_name,
                    snapshot = %snapshot_name,
                    "Saved XStore account secret"
                );
            }
            Ok(Applied::Existing) => {}
            Err(e) => return Outcome::Fail(e),
        }

        ctx.set_secrets_snapshot_ref(snapshot_name).into()
    }
}
