// tests/common/mod.rs
#![allow(dead_code)]

use gok_flow::{ContextData, FlowError, PipelineControl};
use std::future::Future;
use std::pin::Pin;
use once_cell::sync::Lazy;

static TRACING: Lazy<()> = Lazy::new(|| {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_test_writer()
    .try_init();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING);
}

/// A toy order-tally context: every handler appends its step name to `trail`.
#[derive(Clone, Debug, Default)]
pub struct TallyCtx {
  pub trail: Vec<String>,
  pub total: i64,
  pub skip_discount: bool,
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum TallyError {
  #[error("flow: {0}")]
  Flow(String),
  #[error("rejected: {0}")]
  Rejected(String),
}

impl From<FlowError> for TallyError {
  fn from(err: FlowError) -> Self {
    TallyError::Flow(err.to_string())
  }
}

pub type TallyFuture = Pin<Box<dyn Future<Output = Result<PipelineControl, TallyError>> + Send>>;

/// Handler that records `label` and adds `amount` to the running total.
pub fn add(label: &'static str, amount: i64) -> impl Fn(ContextData<TallyCtx>) -> TallyFuture + Send + Sync + 'static {
  move |ctx: ContextData<TallyCtx>| -> TallyFuture {
    Box::pin(async move {
      ctx.update(|d| {
        d.trail.push(label.to_string());
        d.total += amount;
      });
      Ok::<_, TallyError>(PipelineControl::Continue)
    })
  }
}

/// Handler that records `label` and then fails.
pub fn reject(label: &'static str) -> impl Fn(ContextData<TallyCtx>) -> TallyFuture + Send + Sync + 'static {
  move |ctx: ContextData<TallyCtx>| -> TallyFuture {
    Box::pin(async move {
      ctx.write().trail.push(label.to_string());
      Err::<PipelineControl, _>(TallyError::Rejected(label.to_string()))
    })
  }
}
