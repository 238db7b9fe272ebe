// gok_checkout/src/state.rs

use crate::cache::Cache;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::pipelines;
use crate::services::{CouponEngine, OrderAssembler, PaymentOrchestrator, QrRenderer, VietQr};
use crate::store::Store;
use gok_flow::Flows;
use std::sync::Arc;

/// Everything a handler or pipeline step needs, cheap to clone.
#[derive(Clone)]
pub struct AppState {
  pub store: Arc<dyn Store>,
  pub flows: Arc<Flows<AppError>>,
  pub config: Arc<AppConfig>,
  pub clock: Arc<dyn Clock>,
  pub coupons: Arc<CouponEngine>,
  pub orders: Arc<OrderAssembler>,
  pub payments: Arc<PaymentOrchestrator>,
}

impl AppState {
  /// Wires the services over `store` and registers every pipeline.
  pub fn new(config: Arc<AppConfig>, store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
    let qr: Arc<dyn QrRenderer> = Arc::new(VietQr::new(
      config.qr_image_base_url.clone(),
      config.qr_template.clone(),
    ));
    Self::with_qr(config, store, clock, qr)
  }

  pub fn with_qr(
    config: Arc<AppConfig>,
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    qr: Arc<dyn QrRenderer>,
  ) -> Self {
    let settings = config.checkout_settings();
    let cache = Arc::new(Cache::new(config.cache_ttl()));

    let coupons = Arc::new(CouponEngine::new(store.clone(), clock.clone()));
    let orders = Arc::new(OrderAssembler::new(store.clone(), clock.clone(), settings.clone()));
    let payments = Arc::new(PaymentOrchestrator::new(
      store.clone(),
      clock.clone(),
      settings,
      qr,
      cache,
    ));

    let state = Self {
      store,
      flows: Arc::new(Flows::<AppError>::new()),
      config,
      clock,
      coupons,
      orders,
      payments,
    };
    pipelines::register_all_pipelines(&state.flows, &state);
    state
  }
}
