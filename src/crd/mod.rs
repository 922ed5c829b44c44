//! Custom Resource Definitions for the XStore Backup Operator

mod cluster_backup;
mod xstore_backup;

pub use cluster_backup::*;
pub use xstore_backup::*;

use kube::CustomResourceExt;

use crate::error::Result;

/// Generate all CRD YAML manifests
pub fn generate_crds() -> Result<Vec<String>> {
    Ok(vec![
        serde_yaml::to_string(&XStoreBackup::crd())?,
        serde_yaml::to_string(&ClusterBackup::crd())?,
    ])
}
