// gok_flow/src/core/control.rs

//! Flow-control signals returned by handlers and the overall outcome of a run.

/// Returned by every handler to tell the engine what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineControl {
  /// Keep going: remaining handlers of this step, then the following steps.
  Continue,
  /// Halt the whole pipeline after this handler. Not an error.
  Stop,
}

/// Outcome of a pipeline run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineResult {
  /// Every step was executed, skipped by its condition, or optional without handlers.
  Completed,
  /// A handler returned `PipelineControl::Stop`.
  Stopped,
}

impl PipelineResult {
  pub fn is_completed(self) -> bool {
    matches!(self, PipelineResult::Completed)
  }
}
