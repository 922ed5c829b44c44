//! Ordered step lists with a deferred finalizer

use crate::control::Step;

/// The steps to run in one pass, plus a finalizer that runs however the
/// pass ends
#[derive(Default)]
pub struct Task<'a> {
    steps: Vec<&'a dyn Step>,
    finalizer: Option<&'a dyn Step>,
}

impl<'a> Task<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(&mut self, step: &'a dyn Step) -> &mut Self {
        self.steps.push(step);
        self
    }

    pub fn add_steps(&mut self, steps: &[&'a dyn Step]) -> &mut Self {
        self.steps.extend_from_slice(steps);
        self
    }

    /// Register the step run after the task stops. A later call replaces an
    /// earlier one.
    pub fn defer(&mut self, finalizer: &'a dyn Step) -> &mut Self {
        self.finalizer = Some(finalizer);
        self
    }

    pub fn steps(&self) -> &[&'a dyn Step] {
        &self.steps
    }

    pub fn finalizer(&self) -> Option<&'a dyn Step> {
        self.finalizer
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn step_names(&self) -> Vec<&'static str> {
        self.steps.iter().map(|s| s.name()).collect()
    }
}
