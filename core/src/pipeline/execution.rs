// gok_flow/src/pipeline/execution.rs

//! `Pipeline::run`: walks the steps in order and drives each handler phase.

use crate::core::context::Handler;
use crate::core::context_data::ContextData;
use crate::core::control::{PipelineControl, PipelineResult};
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;
use tracing::{event, instrument, span, Instrument, Level};

impl<TData, Err> Pipeline<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  /// Runs every step against `ctx_data`.
  ///
  /// A step whose `skip_if` returns true is skipped. A step with no handlers is
  /// skipped when optional and fails with `FlowError::HandlerMissing` otherwise.
  /// The first handler error aborts the run; the first `Stop` ends it early.
  #[instrument(
    name = "Pipeline::run",
    skip_all,
    fields(
      context_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, Err> {
    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();
      let step_span = span!(Level::INFO, "pipeline_step", step = step_name, index = step_idx);

      if step_def.should_skip(&ctx_data) {
        event!(parent: &step_span, Level::DEBUG, "step skipped by condition");
        continue;
      }

      let phases = [
        ("before", self.before.get(step_name)),
        ("on", self.on.get(step_name)),
        ("after", self.after.get(step_name)),
      ];
      if phases.iter().all(|(_, handlers)| handlers.map_or(true, |h| h.is_empty())) {
        if step_def.optional {
          event!(parent: &step_span, Level::DEBUG, "optional step has no handlers");
          continue;
        }
        event!(parent: &step_span, Level::ERROR, "required step has no handlers");
        return Err(Err::from(FlowError::HandlerMissing {
          step_name: step_def.name.clone(),
        }));
      }

      for (phase, handlers) in phases {
        let Some(handlers) = handlers else { continue };
        let control = run_phase(handlers, &ctx_data, phase)
          .instrument(step_span.clone())
          .await?;
        if control == PipelineControl::Stop {
          event!(parent: &step_span, Level::INFO, phase, "pipeline stopped by handler");
          return Ok(PipelineResult::Stopped);
        }
      }
    }

    event!(Level::DEBUG, "pipeline completed");
    Ok(PipelineResult::Completed)
  }
}

async fn run_phase<TData, Err>(
  handlers: &[Handler<TData, Err>],
  ctx_data: &ContextData<TData>,
  phase: &'static str,
) -> Result<PipelineControl, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + Send + Sync + 'static,
{
  for (idx, handler) in handlers.iter().enumerate() {
    match handler(ctx_data.clone()).await {
      Ok(PipelineControl::Continue) => {}
      Ok(PipelineControl::Stop) => return Ok(PipelineControl::Stop),
      Err(e) => {
        event!(Level::ERROR, phase, handler_index = idx, error = %e, "handler failed");
        return Err(e);
      }
    }
  }
  Ok(PipelineControl::Continue)
}
