// gok_flow/src/pipeline/definition.rs

//! The `Pipeline<TData, Err>` struct and its structural editing API.

use crate::core::context::Handler;
use crate::core::step::{SkipCondition, StepDef};
use crate::error::FlowError;
use std::collections::HashMap;

/// An ordered list of named steps, each with `before`, `on` and `after` handlers,
/// run against a shared `ContextData<TData>`.
///
/// `Err` is what handlers return; it must absorb `FlowError` so engine-detected
/// problems (a required step without handlers) surface through the same channel.
pub struct Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub(crate) steps: Vec<StepDef<TData>>,
  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Builds a pipeline from `(name, optional, skip_if)` triples.
  pub fn new(step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(name, optional, skip_if)| StepDef::new(*name, *optional, skip_if.clone()))
      .collect();

    Self {
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
    }
  }

  pub fn step_names(&self) -> Vec<&str> {
    self.steps.iter().map(|s| s.name.as_str()).collect()
  }

  pub fn has_step(&self, step_name: &str) -> bool {
    self.position(step_name).is_some()
  }

  fn position(&self, step_name: &str) -> Option<usize> {
    self.steps.iter().position(|s| s.name == step_name)
  }

  /// Panics on unknown step names: wiring a handler to a typo is a programming error.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.has_step(step_name) {
      panic!("gok_flow setup error: step '{}' is not defined in this pipeline", step_name);
    }
  }

  fn insert_at(&mut self, idx: usize, step: StepDef<TData>) -> Result<(), FlowError> {
    if self.has_step(&step.name) {
      return Err(FlowError::ConfigurationError {
        step_name: step.name,
        message: "a step with this name already exists".to_string(),
      });
    }
    self.steps.insert(idx, step);
    Ok(())
  }

  pub fn insert_before_step(
    &mut self,
    existing_step_name: &str,
    new_step_name: impl Into<String>,
    optional: bool,
    skip_if: Option<SkipCondition<TData>>,
  ) -> Result<(), FlowError> {
    let idx = self.position(existing_step_name).ok_or_else(|| FlowError::StepNotFound {
      step_name: existing_step_name.to_string(),
    })?;
    self.insert_at(idx, StepDef::new(new_step_name, optional, skip_if))
  }

  pub fn insert_after_step(
    &mut self,
    existing_step_name: &str,
    new_step_name: impl Into<String>,
    optional: bool,
    skip_if: Option<SkipCondition<TData>>,
  ) -> Result<(), FlowError> {
    let idx = self.position(existing_step_name).ok_or_else(|| FlowError::StepNotFound {
      step_name: existing_step_name.to_string(),
    })?;
    self.insert_at(idx + 1, StepDef::new(new_step_name, optional, skip_if))
  }

  /// Removes a step with all of its handlers. Unknown names are a no-op.
  pub fn remove_step(&mut self, step_name: &str) {
    if let Some(idx) = self.position(step_name) {
      self.steps.remove(idx);
      self.before.remove(step_name);
      self.on.remove(step_name);
      self.after.remove(step_name);
    }
  }

  pub fn set_optional(&mut self, step_name: &str, optional: bool) -> Result<(), FlowError> {
    self.step_mut(step_name)?.optional = optional;
    Ok(())
  }

  pub fn set_skip_condition(
    &mut self,
    step_name: &str,
    skip_if: Option<SkipCondition<TData>>,
  ) -> Result<(), FlowError> {
    self.step_mut(step_name)?.skip_if = skip_if;
    Ok(())
  }

  fn step_mut(&mut self, step_name: &str) -> Result<&mut StepDef<TData>, FlowError> {
    self
      .steps
      .iter_mut()
      .find(|s| s.name == step_name)
      .ok_or_else(|| FlowError::StepNotFound {
        step_name: step_name.to_string(),
      })
  }
}
