//! [`ControlPlane`] backed by the Kubernetes API server

use async_trait::async_trait;
use k8s_openapi::api::batch::v1::Job;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::{
    api::{DeleteParams, ListParams, Patch, PatchParams, PostParams},
    Api, Client, Resource,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Map, Value};
use std::fmt::Debug;
use tracing::debug;

use crate::adapters::control_plane::{Applied, ControlPlane, JobState};
use crate::crd::{ClusterBackup, XStoreBackup, XStoreBackupStatus};
use crate::error::{Error, Result};

/// Control plane talking to a live cluster
#[derive(Clone)]
pub struct KubeControlPlane {
    client: Client,
    field_manager: String,
}

impl KubeControlPlane {
    pub fn new(client: Client, field_manager: impl Into<String>) -> Self {
        Self {
            client,
            field_manager: field_manager.into(),
        }
    }

    fn api<K>(&self, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = k8s_openapi::NamespaceResourceScope>,
        <K as Resource>::DynamicType: Default,
    {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn is_status(err: &kube::Error, code: u16) -> bool {
    matches!(err, kube::Error::Api(api_err) if api_err.code == code)
}

async fn create_if_absent<K>(api: &Api<K>, object: &K) -> Result<Applied>
where
    K: Resource + Clone + Debug + Serialize + DeserializeOwned,
{
    match api.create(&PostParams::default(), object).await {
        Ok(_) => Ok(Applied::Created),
        Err(e) if is_status(&e, 409) => Ok(Applied::Existing),
        Err(e) => Err(e.into()),
    }
}

async fn delete_if_present<K>(api: &Api<K>, name: &str) -> Result<bool>
where
    K: Resource + Clone + Debug + DeserializeOwned,
{
    match api.delete(name, &DeleteParams::background()).await {
        Ok(_) => Ok(true),
        Err(e) if is_status(&e, 404) => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Build a JSON merge patch turning `old` into `new`.
///
/// Merge patches only remove keys that are explicitly null, so every key
/// present in `old` but absent from `new` is emitted as null.
fn merge_patch(old: &Value, new: &Value) -> Value {
    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let mut out: Map<String, Value> = new_map.clone();
            for (key, old_value) in old_map {
                let patched = match new_map.get(key) {
                    Some(new_value) => merge_patch(old_value, new_value),
                    None => Value::Null,
                };
                out.insert(key.clone(), patched);
            }
            Value::Object(out)
        }
        _ => new.clone(),
    }
}

/// Status merge patch; a resource version makes the API server reject it
/// with 409 when the object moved on
fn status_patch(resource_version: Option<&str>, status: Value) -> Value {
    match resource_version {
        Some(rv) => json!({ "metadata": { "resourceVersion": rv }, "status": status }),
        None => json!({ "status": status }),
    }
}

#[async_trait]
impl ControlPlane for KubeControlPlane {
    async fn create_job(&self, namespace: &str, job: Job) -> Result<Applied> {
        create_if_absent(&self.api::<Job>(namespace), &job).await
    }

    async fn job_state(&self, namespace: &str, name: &str) -> Result<Option<JobState>> {
        let job = self.api::<Job>(namespace).get_opt(name).await?;
        Ok(job.as_ref().map(JobState::of))
    }

    async fn delete_job(&self, namespace: &str, name: &str) -> Result<bool> {
        delete_if_present(&self.api::<Job>(namespace), name).await
    }

    async fn create_config_map(&self, namespace: &str, config_map: ConfigMap) -> Result<Applied> {
        create_if_absent(&self.api::<ConfigMap>(namespace), &config_map).await
    }

    async fn get_config_map(&self, namespace: &str, name: &str) -> Result<Option<ConfigMap>> {
        Ok(self.api::<ConfigMap>(namespace).get_opt(name).await?)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>> {
        Ok(self.api::<Secret>(namespace).get_opt(name).await?)
    }

    async fn create_secret(&self, namespace: &str, secret: Secret) -> Result<Applied> {
        create_if_absent(&self.api::<Secret>(namespace), &secret).await
    }

    async fn get_cluster_backup(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ClusterBackup>> {
        Ok(self.api::<ClusterBackup>(namespace).get_opt(name).await?)
    }

    async fn list_backups(&self, namespace: &str) -> Result<Vec<XStoreBackup>> {
        let list = self
            .api::<XStoreBackup>(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list.items)
    }

    async fn delete_backup(&self, namespace: &str, name: &str) -> Result<bool> {
        delete_if_present(&self.api::<XStoreBackup>(namespace), name).await
    }

    async fn patch_backup_status(
        &self,
        namespace: &str,
        name: &str,
        resource_version: Option<&str>,
        committed: &XStoreBackupStatus,
        status: &XStoreBackupStatus,
    ) -> Result<()> {
        debug!(name = %name, namespace = %namespace, phase = %status.phase, "Patching status");
        let patch = status_patch(
            resource_version,
            merge_patch(&serde_json::to_value(committed)?, &serde_json::to_value(status)?),
        );
        let result = self
            .api::<XStoreBackup>(namespace)
            .patch_status(
                name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(patch),
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) if is_status(&e, 409) => {
                Err(Error::StatusConflict(format!("{}/{}", namespace, name)))
            }
            Err(e) => Err(e.into()),
        }
    }
}
