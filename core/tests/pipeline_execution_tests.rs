// tests/pipeline_execution_tests.rs
mod common;

use common::*;
use gok_flow::{ContextData, Pipeline, PipelineControl, PipelineResult, SkipCondition};
use serial_test::serial;
use std::sync::Arc;

#[tokio::test]
#[serial]
async fn steps_run_in_declared_order() {
  setup_tracing();
  let mut p = Pipeline::<TallyCtx, TallyError>::new(&[
    ("price", false, None),
    ("tax", false, None),
    ("shipping", false, None),
  ]);
  p.on_step("shipping", add("shipping", 30));
  p.on_step("price", add("price", 100));
  p.on_step("tax", add("tax", 10));

  let ctx = ContextData::new(TallyCtx::default());
  let result = p.run(ctx.clone()).await;

  assert_eq!(result, Ok(PipelineResult::Completed));
  let data = ctx.read();
  assert_eq!(data.trail, vec!["price", "tax", "shipping"]);
  assert_eq!(data.total, 140);
}

#[tokio::test]
#[serial]
async fn before_on_after_phases_run_in_sequence() {
  setup_tracing();
  let mut p = Pipeline::<TallyCtx, TallyError>::new(&[("place", false, None)]);
  p.after_step("place", add("after", 0));
  p.on_step("place", add("on", 0));
  p.before_step("place", add("before", 0));

  let ctx = ContextData::new(TallyCtx::default());
  p.run(ctx.clone()).await.unwrap();

  assert_eq!(ctx.read().trail, vec!["before", "on", "after"]);
}

#[tokio::test]
#[serial]
async fn stop_ends_the_run_without_error() {
  setup_tracing();
  let mut p = Pipeline::<TallyCtx, TallyError>::new(&[
    ("price", false, None),
    ("gate", false, None),
    ("pay", false, None),
  ]);
  p.on_step("price", add("price", 100));
  p.on_step("gate", |ctx: ContextData<TallyCtx>| {
    Box::pin(async move {
      ctx.write().trail.push("gate".to_string());
      Ok::<_, TallyError>(PipelineControl::Stop)
    })
  });
  p.on_step("pay", add("pay", 1));

  let ctx = ContextData::new(TallyCtx::default());
  assert_eq!(p.run(ctx.clone()).await, Ok(PipelineResult::Stopped));
  assert_eq!(ctx.read().trail, vec!["price", "gate"]);
  assert_eq!(ctx.read().total, 100);
}

#[tokio::test]
#[serial]
async fn handler_error_aborts_remaining_steps() {
  setup_tracing();
  let mut p = Pipeline::<TallyCtx, TallyError>::new(&[
    ("price", false, None),
    ("coupon", false, None),
    ("pay", false, None),
  ]);
  p.on_step("price", add("price", 100));
  p.on_step("coupon", reject("coupon"));
  p.on_step("pay", add("pay", 1));

  let ctx = ContextData::new(TallyCtx::default());
  let err = p.run(ctx.clone()).await.unwrap_err();

  assert_eq!(err, TallyError::Rejected("coupon".to_string()));
  assert_eq!(ctx.read().trail, vec!["price", "coupon"]);
}

#[tokio::test]
#[serial]
async fn skip_condition_bypasses_step() {
  setup_tracing();
  let skip_discount: SkipCondition<TallyCtx> = Arc::new(|ctx: ContextData<TallyCtx>| ctx.read().skip_discount);
  let mut p = Pipeline::<TallyCtx, TallyError>::new(&[("price", false, None), ("discount", false, Some(skip_discount))]);
  p.on_step("price", add("price", 100));
  p.on_step("discount", add("discount", -10));

  let ctx = ContextData::new(TallyCtx {
    skip_discount: true,
    ..Default::default()
  });
  assert_eq!(p.run(ctx.clone()).await, Ok(PipelineResult::Completed));
  assert_eq!(ctx.read().total, 100);

  let ctx = ContextData::new(TallyCtx::default());
  p.run(ctx.clone()).await.unwrap();
  assert_eq!(ctx.read().total, 90);
}

#[tokio::test]
#[serial]
async fn required_step_without_handlers_fails_but_optional_is_skipped() {
  setup_tracing();
  let mut p = Pipeline::<TallyCtx, TallyError>::new(&[("price", false, None), ("notify", true, None)]);
  p.on_step("price", add("price", 100));
  let ctx = ContextData::new(TallyCtx::default());
  assert_eq!(p.run(ctx).await, Ok(PipelineResult::Completed));

  p.set_optional("notify", false).unwrap();
  let err = p.run(ContextData::new(TallyCtx::default())).await.unwrap_err();
  assert!(matches!(err, TallyError::Flow(msg) if msg.contains("notify")));
}

#[tokio::test]
#[serial]
async fn steps_can_be_inserted_and_removed() {
  setup_tracing();
  let mut p = Pipeline::<TallyCtx, TallyError>::new(&[("price", false, None), ("pay", false, None)]);
  p.insert_after_step("price", "tax", false, None).unwrap();
  p.insert_before_step("price", "validate", true, None).unwrap();
  assert_eq!(p.step_names(), vec!["validate", "price", "tax", "pay"]);

  assert!(p.insert_after_step("price", "pay", false, None).is_err());
  assert!(p.insert_after_step("missing", "x", false, None).is_err());

  p.on_step("pay", add("pay", 1));
  p.remove_step("pay");
  assert!(!p.has_step("pay"));
  assert_eq!(p.step_names(), vec!["validate", "price", "tax"]);
}

#[test]
#[should_panic(expected = "not defined")]
fn wiring_a_handler_to_an_unknown_step_panics() {
  let mut p = Pipeline::<TallyCtx, TallyError>::new(&[("price", false, None)]);
  p.on_step("prise", add("typo", 0));
}
