//! Sequential task executor

use std::time::Duration;

use tracing::{debug, error, warn};

use crate::control::{BackupContext, Outcome, Task, Verdict};
use crate::error::Error;
use crate::metrics;

/// Where the step list stopped
enum Stop {
    Completed,
    Paused(Option<Duration>),
    Failed(Error),
}

/// Runs a task's steps in order and turns the outcome into a [`Verdict`].
///
/// The executor keeps nothing between passes; everything it needs comes from
/// the context.
#[derive(Clone, Debug)]
pub struct Executor {
    default_pause: Duration,
}

impl Executor {
    pub fn new(default_pause: Duration) -> Self {
        Self { default_pause }
    }

    pub async fn run(&self, task: &Task<'_>, ctx: &mut BackupContext) -> Verdict {
        let stop = self.run_steps(task, ctx).await;
        let finalized = match task.finalizer() {
            Some(finalizer) => {
                let outcome = finalizer.execute(ctx).await;
                record(finalizer.name(), &outcome);
                outcome
            }
            None => Outcome::Continue,
        };

        match (stop, finalized) {
            (Stop::Failed(e), Outcome::Fail(finalize_err)) => {
                error!(
                    name = %ctx.name(),
                    error = %finalize_err,
                    "Finalizer failed after step failure"
                );
                Verdict::Error(e)
            }
            (Stop::Failed(e), _) => Verdict::Error(e),
            (_, Outcome::Fail(finalize_err)) => Verdict::Error(finalize_err),
            (Stop::Paused(delay), _) => {
                Verdict::RequeueAfter(delay.unwrap_or(self.default_pause))
            }
            (Stop::Completed, _) => {
                if ctx.requeue_requested() {
                    Verdict::RequeueNow
                } else {
                    Verdict::Done
                }
            }
        }
    }

    async fn run_steps(&self, task: &Task<'_>, ctx: &mut BackupContext) -> Stop {
        for step in task.steps() {
            let outcome = step.execute(ctx).await;
            record(step.name(), &outcome);

            match outcome {
                Outcome::Continue => {
                    debug!(name = %ctx.name(), step = step.name(), "Step continued");
                }
                Outcome::Pause(delay) => {
                    debug!(name = %ctx.name(), step = step.name(), delay = ?delay, "Step paused");
                    return Stop::Paused(delay);
                }
                Outcome::Fail(e) => {
                    warn!(name = %ctx.name(), step = step.name(), error = %e, "Step failed");
                    return Stop::Failed(e);
                }
            }
        }
        Stop::Completed
    }
}

fn record(step: &str, outcome: &Outcome) {
    metrics::STEP_OUTCOMES
        .with_label_values(&[step, outcome.label()])
        .inc();
}
