// gok_checkout/src/main.rs

//! Demo runner: loads config, opens the store, seeds it, then walks one
//! bank-transfer checkout through to payment.

use gok_checkout::clock::SystemClock;
use gok_checkout::config::AppConfig;
use gok_checkout::errors::Result as AppResult;
use gok_checkout::models::{CustomerInfo, PaymentMethod};
use gok_checkout::pipelines::CheckoutRequest;
use gok_checkout::seed::{seed_store, WELCOME_COUPON};
use gok_checkout::services::OrderLine;
use gok_checkout::state::AppState;
use gok_checkout::web::handlers::{checkout_handlers, payment_handlers};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::fmt::format::FmtSpan;

fn init_tracing() {
  let builder = tracing_subscriber::fmt()
    .with_max_level(Level::INFO)
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_span_events(FmtSpan::CLOSE);
  if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
    builder.json().init();
  } else {
    builder.init();
  }
}

#[tokio::main]
async fn main() {
  init_tracing();
  tracing::info!("Starting checkout demo...");

  if let Err(e) = run().await {
    tracing::error!(error = %e, "Checkout demo failed.");
    std::process::exit(1);
  }
}

async fn run() -> AppResult<()> {
  let config = Arc::new(AppConfig::from_env()?);
  let store = gok_checkout::connect_store(&config).await?;
  let state = AppState::new(config.clone(), store, Arc::new(SystemClock));
  tracing::info!("Checkout pipelines registered.");

  let in_memory = config.database_url.is_none();
  if !(config.seed_db || in_memory) {
    tracing::info!("SEED_DB disabled and store is persistent; nothing to demo.");
    return Ok(());
  }
  let seeded = seed_store(&state).await?;
  if seeded.product_ids.is_empty() {
    tracing::info!("Store was seeded earlier; skipping the demo checkout.");
    return Ok(());
  }

  let request = CheckoutRequest {
    customer: CustomerInfo {
      user_id: None,
      name: "Nguyen Van A".to_string(),
      email: Some("a.nguyen@example.com".to_string()),
      phone: "0901234567".to_string(),
      shipping_address: "12 Ly Tu Trong, District 1, Ho Chi Minh City".to_string(),
      notes: None,
    },
    items: vec![
      OrderLine::new(seeded.product_ids[0], 2),
      OrderLine::new(seeded.product_ids[1], 1),
    ],
    payment_method: PaymentMethod::BankTransfer,
    coupon_code: Some(WELCOME_COUPON.to_string()),
    bank_code: None,
    session_id: None,
  };

  let response = checkout_handlers::checkout(&state, request).await;
  let Some(summary) = response.data else {
    tracing::error!(errors = ?response.errors, "{}", response.message);
    return Ok(());
  };
  tracing::info!(
    order_number = %summary.order_number,
    total = %summary.total_amount,
    qr = ?summary.qr_code_image_url,
    "Checkout created."
  );

  let paid = payment_handlers::mark_as_paid(&state, summary.payment_id).await;
  tracing::info!(success = paid.success, "{}", paid.message);
  Ok(())
}
