//! Reconcilers for XStore Backup CRDs
//!
//! This module contains the business logic for reconciling each CRD type.
//! Reconcilers are responsible for:
//! - Validating CRD specs
//! - Mapping each backup phase to the steps it runs
//! - Driving jobs and coordinator waits through the control engine

pub mod steps;
pub mod xstore_backup;
