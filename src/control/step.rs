//! The Step contract

use std::time::Duration;

use async_trait::async_trait;

use crate::control::BackupContext;
use crate::error::Error;

/// What a step asks the executor to do next
#[derive(Debug)]
pub enum Outcome {
    /// Done (or nothing to do); run the next step
    Continue,
    /// Condition not met yet; stop this pass and come back later
    Pause(Option<Duration>),
    /// Stop this pass and surface the error
    Fail(Error),
}

impl Outcome {
    /// Pause using the executor's default delay
    pub fn pause() -> Self {
        Outcome::Pause(None)
    }

    pub fn pause_for(delay: Duration) -> Self {
        Outcome::Pause(Some(delay))
    }

    pub fn fail(error: impl Into<Error>) -> Self {
        Outcome::Fail(error.into())
    }

    /// Label used in logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Continue => "continue",
            Outcome::Pause(_) => "pause",
            Outcome::Fail(_) => "fail",
        }
    }
}

impl From<crate::error::Result<()>> for Outcome {
    fn from(result: crate::error::Result<()>) -> Self {
        match result {
            Ok(()) => Outcome::Continue,
            Err(e) => Outcome::Fail(e),
        }
    }
}

/// One idempotent unit of reconciliation work.
///
/// A step may run any number of times for the same backup: it must detect
/// work that is already done and report `Continue` for it, and report
/// `Pause` rather than `Fail` while an external condition does not hold.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name used in logs and metrics
    fn name(&self) -> &'static str;

    async fn execute(&self, ctx: &mut BackupContext) -> Outcome;
}
