// gok_checkout/src/pipelines/mod.rs

//! Defines and registers the gok_flow pipelines used by the checkout core.

use crate::errors::AppError;
use crate::state::AppState;
use gok_flow::Flows;
use std::sync::Arc;

pub mod checkout_pipeline;
pub mod contexts;

pub use checkout_pipeline::run_checkout;
pub use contexts::{CheckoutCtxData, CheckoutRequest, CheckoutSummary};

/// Registers every pipeline with `flows`. Called once while building `AppState`.
pub fn register_all_pipelines(flows: &Arc<Flows<AppError>>, app_state: &AppState) {
  tracing::info!("Registering checkout pipelines...");
  checkout_pipeline::register_checkout_pipeline(flows, app_state);
  tracing::info!("All checkout pipelines registered.");
}
