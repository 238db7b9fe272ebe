// gok_flow/src/core/context.rs

//! The boxed handler type stored by pipelines.

use crate::core::context_data::ContextData;
use crate::core::control::PipelineControl;
use std::future::Future;
use std::pin::Pin;

/// Future returned by a stored handler.
pub type HandlerFuture<Err> = Pin<Box<dyn Future<Output = Result<PipelineControl, Err>> + Send>>;

/// A step handler: receives a clone of the shared context and resolves to a
/// control signal or the pipeline's error type.
///
/// Handlers lock the context with `.read()` / `.write()` and must release the
/// guard before awaiting anything.
pub type Handler<TData, Err> = Box<dyn Fn(ContextData<TData>) -> HandlerFuture<Err> + Send + Sync>;
