//! Adapters between backup steps and the Kubernetes API

mod control_plane;
mod kube_control_plane;
mod manifests;

pub use control_plane::*;
pub use kube_control_plane::*;
pub use manifests::*;
