//! XStoreBackup controller
//!
//! Watches XStoreBackup resources and the jobs they own, and triggers
//! reconciliation.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use k8s_openapi::api::batch::v1::Job;
use kube::{
    api::ListParams,
    runtime::{
        controller::{Action, Controller},
        finalizer::{finalizer, Event as FinalizerEvent},
        watcher::Config as WatcherConfig,
    },
    Api, Client, ResourceExt,
};
use tracing::{error, info, instrument};

use crate::controllers::Context;
use crate::crd::XStoreBackup;
use crate::error::{Error, Result};
use crate::metrics;
use crate::reconcilers::xstore_backup as backup_reconciler;

/// Finalizer name for XStoreBackup resources
const FINALIZER_NAME: &str = "xstore.oso.sh/backup-finalizer";

/// Run the XStoreBackup controller
pub async fn run(client: Client, context: Arc<Context>) {
    let api: Api<XStoreBackup> = Api::all(client.clone());

    // Verify CRD is installed
    if let Err(e) = api.list(&ListParams::default().limit(1)).await {
        error!("XStoreBackup CRD not installed: {}", e);
        return;
    }

    info!("Starting XStoreBackup controller");

    let jobs: Api<Job> = Api::all(client.clone());
    Controller::new(api, WatcherConfig::default())
        .owns(jobs, WatcherConfig::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, context)
        .for_each(|result| async move {
            match result {
                Ok((obj, _action)) => {
                    info!(
                        name = %obj.name,
                        namespace = obj.namespace.as_deref().unwrap_or("default"),
                        "Reconciled XStoreBackup"
                    );
                }
                Err(e) => {
                    error!(error = %e, "Reconciliation error");
                    metrics::RECONCILIATION_ERRORS
                        .with_label_values(&["XStoreBackup"])
                        .inc();
                }
            }
        })
        .await;
}

fn object_key(obj: &XStoreBackup) -> String {
    format!(
        "{}/{}",
        obj.namespace().unwrap_or_else(|| "default".to_string()),
        obj.name_any()
    )
}

/// Main reconciliation function
#[instrument(skip(ctx), fields(name = %obj.name_any(), namespace = obj.namespace()))]
async fn reconcile(obj: Arc<XStoreBackup>, ctx: Arc<Context>) -> Result<Action> {
    let _timer = metrics::RECONCILE_DURATION
        .with_label_values(&["XStoreBackup"])
        .start_timer();
    metrics::RECONCILIATIONS
        .with_label_values(&["XStoreBackup"])
        .inc();

    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    let api: Api<XStoreBackup> = Api::namespaced(ctx.client.clone(), &namespace);

    // Use finalizer for proper cleanup handling
    finalizer(&api, FINALIZER_NAME, obj, |event| async {
        match event {
            FinalizerEvent::Apply(backup) => apply(backup, ctx.clone()).await,
            FinalizerEvent::Cleanup(backup) => cleanup(backup, ctx.clone()).await,
        }
    })
    .await
    .map_err(|e| Error::Finalizer(Box::new(e)))
}

/// Run one pass of the phase machine
async fn apply(backup: Arc<XStoreBackup>, ctx: Arc<Context>) -> Result<Action> {
    let key = object_key(&backup);
    info!(
        name = %backup.name_any(),
        phase = %backup.phase(),
        "Reconciling XStoreBackup"
    );

    let verdict = backup_reconciler::reconcile(
        backup,
        ctx.control_plane.clone(),
        ctx.config.clone(),
    )
    .await;

    if !verdict.is_error() {
        ctx.backoff.reset(&key);
    }
    verdict.into_action()
}

/// Cleanup when resource is being deleted
async fn cleanup(backup: Arc<XStoreBackup>, ctx: Arc<Context>) -> Result<Action> {
    let key = object_key(&backup);
    info!(name = %backup.name_any(), "Cleaning up XStoreBackup");

    // Backup artifacts in storage are kept; only the transient jobs go
    let verdict = backup_reconciler::cleanup(
        backup,
        ctx.control_plane.clone(),
        ctx.config.clone(),
    )
    .await;

    metrics::CLEANUPS.with_label_values(&["XStoreBackup"]).inc();
    ctx.backoff.reset(&key);
    verdict.into_action()
}

/// Error policy for the controller
fn error_policy(obj: Arc<XStoreBackup>, error: &Error, ctx: Arc<Context>) -> Action {
    let name = obj.name_any();

    let requeue_duration = if error.is_permanent() {
        Duration::from_secs(ctx.config.error_backoff_max_secs)
    } else {
        ctx.backoff.next_delay(&object_key(&obj), &ctx.config)
    };

    error!(
        name = %name,
        error = %error,
        retry_in = ?requeue_duration,
        "Reconciliation failed, scheduling retry"
    );

    Action::requeue(requeue_duration)
}
