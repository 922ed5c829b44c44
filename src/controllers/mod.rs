//! Kubernetes controllers for XStore Backup CRDs
//!
//! This module contains the controller implementations that watch for CRD changes
//! and trigger reconciliation.

mod backoff;
mod backup_controller;

pub use backoff::Backoff;
pub use backup_controller::run as run_backup_controller;

use std::sync::Arc;

use kube::Client;

use crate::adapters::{ControlPlane, KubeControlPlane};
use crate::config::OperatorConfig;

/// Shared context for all controllers
pub struct Context {
    /// Kubernetes client
    pub client: Client,
    /// Side-resource operations used by backup steps
    pub control_plane: Arc<dyn ControlPlane>,
    /// Operator configuration
    pub config: Arc<OperatorConfig>,
    /// Per-object failure counters driving retry delays
    pub backoff: Backoff,
}

impl Context {
    /// Create a new context
    pub fn new(client: Client, config: OperatorConfig) -> Self {
        let control_plane = Arc::new(KubeControlPlane::new(
            client.clone(),
            config.field_manager.clone(),
        ));
        Self {
            client,
            control_plane,
            config: Arc::new(config),
            backoff: Backoff::default(),
        }
    }
}
