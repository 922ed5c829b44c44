//! OSO XStore Backup Kubernetes Operator
//!
//! This operator orchestrates multi-stage backups of sharded XStore
//! clusters: a full snapshot, then coordinated binlog capture, driven by a
//! phase machine over idempotent steps.

pub mod adapters;
pub mod config;
pub mod control;
pub mod controllers;
pub mod crd;
pub mod error;
pub mod metrics;
pub mod reconcilers;

pub use error::{Error, Result};
