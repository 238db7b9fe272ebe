// gok_flow/src/core/step.rs

use super::ContextData;
use std::sync::Arc;

/// Predicate evaluated right before a step runs; `true` skips the step.
pub type SkipCondition<TData> = Arc<dyn Fn(ContextData<TData>) -> bool + Send + Sync + 'static>;

/// A named step in a pipeline.
#[derive(Clone)]
pub struct StepDef<TData: 'static + Send + Sync> {
  pub name: String,
  /// Optional steps may have no handlers at all; required ones may not.
  pub optional: bool,
  pub skip_if: Option<SkipCondition<TData>>,
}

impl<TData: 'static + Send + Sync> StepDef<TData> {
  pub fn new(name: impl Into<String>, optional: bool, skip_if: Option<SkipCondition<TData>>) -> Self {
    Self {
      name: name.into(),
      optional,
      skip_if,
    }
  }

  pub(crate) fn should_skip(&self, ctx_data: &ContextData<TData>) -> bool {
    self.skip_if.as_ref().is_some_and(|cond| cond(ctx_data.clone()))
  }
}

impl<TData: 'static + Send + Sync> std::fmt::Debug for StepDef<TData> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("StepDef")
      .field("name", &self.name)
      .field("optional", &self.optional)
      .field("has_skip_condition", &self.skip_if.is_some())
      .finish()
  }
}
