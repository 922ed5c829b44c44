//! What a pass tells the controller

use std::time::Duration;

use kube_runtime::controller::Action;

use crate::error::{Error, Result};

/// Result of one pass over a backup
#[derive(Debug)]
pub enum Verdict {
    /// A phase transition happened; start the next pass right away
    RequeueNow,
    /// A condition is not met yet; check again after the delay
    RequeueAfter(Duration),
    /// Nothing left to do until something changes
    Done,
    /// The pass failed; the caller backs off and retries
    Error(Error),
}

impl Verdict {
    pub fn is_error(&self) -> bool {
        matches!(self, Verdict::Error(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::RequeueNow => "requeue_now",
            Verdict::RequeueAfter(_) => "requeue_after",
            Verdict::Done => "done",
            Verdict::Error(_) => "error",
        }
    }

    /// Map onto a controller action, leaving errors to the error policy
    pub fn into_action(self) -> Result<Action> {
        match self {
            Verdict::RequeueNow => Ok(Action::requeue(Duration::ZERO)),
            Verdict::RequeueAfter(delay) => Ok(Action::requeue(delay)),
            Verdict::Done => Ok(Action::await_change()),
            Verdict::Error(e) => Err(e),
        }
    }
}
