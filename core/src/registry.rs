// gok_flow/src/registry.rs

//! `Flows<E>`: a registry that maps a context type to the pipeline that owns it.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineResult;
use crate::error::FlowError;
use crate::pipeline::definition::Pipeline;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, Level};

#[async_trait]
trait ErasedRunner<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  /// `ctx_obj` must box a `ContextData<TData>` for the runner's `TData`.
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, AppErr>;
}

struct TypedRunner<TData, HandlerErr, AppErr>
where
  TData: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pipeline: Arc<Pipeline<TData, HandlerErr>>,
  _app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, HandlerErr, AppErr> ErasedRunner<AppErr> for TypedRunner<TData, HandlerErr, AppErr>
where
  TData: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<HandlerErr> + From<FlowError> + Send + Sync + 'static,
{
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<PipelineResult, AppErr> {
    let ctx_data = ctx_obj.downcast::<ContextData<TData>>().map_err(|_| {
      AppErr::from(FlowError::TypeMismatch {
        expected_type: std::any::type_name::<ContextData<TData>>().to_string(),
      })
    })?;
    self.pipeline.run(*ctx_data).await.map_err(AppErr::from)
  }
}

/// Holds at most one pipeline per context type and dispatches runs by type.
///
/// `AppErr` is what `run` returns; it absorbs both the engine's `FlowError`
/// and each registered pipeline's handler error.
pub struct Flows<AppErr = FlowError>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  registry: RwLock<HashMap<TypeId, Arc<dyn ErasedRunner<AppErr>>>>,
}

impl<AppErr> Flows<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      registry: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `pipeline` for its context type, replacing any previous one.
  pub fn register_pipeline<TData, HandlerErr>(&self, pipeline: Pipeline<TData, HandlerErr>)
  where
    TData: 'static + Send + Sync,
    HandlerErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
    AppErr: From<HandlerErr>,
  {
    event!(Level::DEBUG, context_type = %std::any::type_name::<TData>(), steps = pipeline.steps.len(), "registering pipeline");
    let runner = TypedRunner::<TData, HandlerErr, AppErr> {
      pipeline: Arc::new(pipeline),
      _app_err: PhantomData,
    };
    self.registry.write().insert(TypeId::of::<TData>(), Arc::new(runner));
  }

  pub fn is_registered<TData: 'static>(&self) -> bool {
    self.registry.read().contains_key(&TypeId::of::<TData>())
  }

  /// Runs the pipeline registered for `TData` against `ctx_data`.
  pub async fn run<TData>(&self, ctx_data: ContextData<TData>) -> Result<PipelineResult, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    let runner = self
      .registry
      .read()
      .get(&TypeId::of::<TData>())
      .cloned()
      .ok_or_else(|| {
        let type_name = std::any::type_name::<TData>();
        event!(Level::ERROR, context_type = type_name, "no pipeline registered");
        AppErr::from(FlowError::PipelineNotRegistered {
          type_name: type_name.to_string(),
        })
      })?;

    runner.run_erased(Box::new(ctx_data)).await
  }
}

impl<AppErr> Default for Flows<AppErr>
where
  AppErr: std::error::Error + From<FlowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}
