// gok_flow/src/pipeline/hooks.rs

//! Registration of `before`, `on` and `after` handlers.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use std::collections::HashMap;
use std::future::Future;

#[derive(Debug, Clone, Copy)]
enum Phase {
  Before,
  On,
  After,
}

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Adds a handler that runs before the step's `on` handlers.
  ///
  /// The handler may return any error type convertible into the pipeline's `Err`.
  pub fn before_step<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.register(Phase::Before, step_name, handler_fn);
  }

  /// Adds a main handler for the step. Handlers of one phase run in registration order.
  pub fn on_step<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.register(Phase::On, step_name, handler_fn);
  }

  pub fn after_step<F, HandlerErr>(
    &mut self,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.register(Phase::After, step_name, handler_fn);
  }

  fn register<F, HandlerErr>(
    &mut self,
    phase: Phase,
    step_name: &str,
    handler_fn: impl Fn(ContextData<TData>) -> F + Send + Sync + 'static,
  ) where
    F: Future<Output = Result<PipelineControl, HandlerErr>> + Send + 'static,
    HandlerErr: Into<Err> + Send + Sync + 'static,
  {
    self.ensure_step_exists(step_name);
    tracing::trace!(step = step_name, ?phase, "registering handler");
    let handler: Handler<TData, Err> = Box::new(move |ctx_data| {
      let fut = handler_fn(ctx_data);
      Box::pin(async move { fut.await.map_err(Into::into) })
    });
    self.phase_mut(phase).entry(step_name.to_string()).or_default().push(handler);
  }

  fn phase_mut(&mut self, phase: Phase) -> &mut HashMap<String, Vec<Handler<TData, Err>>> {
    match phase {
      Phase::Before => &mut self.before,
      Phase::On => &mut self.on,
      Phase::After => &mut self.after,
    }
  }
}
