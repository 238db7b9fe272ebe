// tests/handler_tests.rs
mod common;

use common::*;
use gok_checkout::models::{PaymentMethod, PaymentStatus};
use gok_checkout::seed::WELCOME_COUPON;
use gok_checkout::web::handlers::coupon_handlers::{self, CouponCheckRequest};
use gok_checkout::web::handlers::order_handlers::{self, CreateOrderRequest, UpdateStatusRequest};
use gok_checkout::web::handlers::payment_handlers::{self, CreatePaymentRequest};
use gok_checkout::web::handlers::checkout_handlers;
use rust_decimal_macros::dec;
use serial_test::serial;
use uuid::Uuid;

fn coupon_check(code: &str) -> CouponCheckRequest {
  CouponCheckRequest {
    code: code.to_string(),
    order_amount: dec!(150000),
    user_id: None,
    session_id: None,
  }
}

#[tokio::test]
#[serial]
async fn checkout_handler_wraps_summary() {
  let app = TestApp::new().await;
  let response = checkout_handlers::checkout(&app.state, app.checkout_request(PaymentMethod::BankTransfer, None)).await;

  assert!(response.success);
  assert_eq!(response.message, "Checkout completed");
  let summary = response.data.unwrap();
  let json = serde_json::to_value(&summary).unwrap();
  assert_eq!(json["orderNumber"], summary.order_number.as_str());
  assert!(json["qrCodeImageUrl"].is_string());
}

#[tokio::test]
#[serial]
async fn coupon_handlers_report_rejections_as_unsuccessful() {
  let app = TestApp::new().await;

  let valid = coupon_handlers::validate_coupon(&app.state, coupon_check(WELCOME_COUPON)).await;
  assert!(valid.success);
  assert_eq!(valid.data.unwrap().estimated_discount, dec!(15000));

  let missing = coupon_handlers::validate_coupon(&app.state, coupon_check("MISSING")).await;
  assert!(!missing.success);
  assert_eq!(missing.errors, vec!["Coupon code does not exist".to_string()]);
  assert!(!missing.data.unwrap().is_valid);

  let applied = coupon_handlers::apply_coupon(&app.state, coupon_check(WELCOME_COUPON)).await;
  assert!(applied.success);
  assert_eq!(applied.data.unwrap().final_amount, dec!(135000));

  let reused = coupon_handlers::apply_coupon(&app.state, coupon_check(WELCOME_COUPON)).await;
  assert!(!reused.success);
  assert_eq!(reused.message, "Coupon could not be applied");
  assert_eq!(reused.errors, vec!["Coupon has already been used".to_string()]);
}

#[tokio::test]
#[serial]
async fn order_handlers_map_errors_to_envelopes() {
  let app = TestApp::new().await;
  let created = order_handlers::create_order(
    &app.state,
    CreateOrderRequest {
      customer: customer(None),
      items: app.standard_lines(),
      payment_method: PaymentMethod::CashOnDelivery,
    },
  )
  .await;
  assert!(created.success);
  let order = created.data.unwrap();

  let missing = order_handlers::get_order(&app.state, Uuid::new_v4()).await;
  assert!(!missing.success);
  assert_eq!(missing.message, "Resource not found");
  assert!(missing.data.is_none());

  let invalid = order_handlers::update_order_status(
    &app.state,
    order.id,
    UpdateStatusRequest {
      status: "teleported".to_string(),
    },
  )
  .await;
  assert_eq!(invalid.message, "Invalid request");

  let cancelled = order_handlers::cancel_order(&app.state, order.id).await;
  assert!(cancelled.success);
  let again = order_handlers::cancel_order(&app.state, order.id).await;
  assert_eq!(again.message, "Request violates a business rule");
}

#[tokio::test]
#[serial]
async fn payment_handlers_walk_the_state_machine() {
  let app = TestApp::new().await;
  let order = app
    .state
    .orders
    .create_order(customer(None), &app.standard_lines(), PaymentMethod::BankTransfer)
    .await
    .unwrap();

  let created = payment_handlers::create_payment(
    &app.state,
    CreatePaymentRequest {
      order_id: order.id,
      payment_method: PaymentMethod::BankTransfer,
      bank_code: Some("VCB".to_string()),
    },
  )
  .await;
  let payment = created.data.unwrap();

  let verified = payment_handlers::verify_payment(&app.state, payment.id).await;
  assert_eq!(verified.data.unwrap().status, PaymentStatus::Pending);

  let paid = payment_handlers::mark_as_paid(&app.state, payment.id).await;
  assert!(paid.success);
  let twice = payment_handlers::mark_as_paid(&app.state, payment.id).await;
  assert!(!twice.success);
  assert_eq!(twice.message, "Conflict");

  let by_tx = payment_handlers::get_payment_by_transaction(&app.state, &payment.transaction_id).await;
  assert_eq!(by_tx.data.unwrap().status, PaymentStatus::Paid);

  let banks = payment_handlers::list_bank_configs(&app.state, false).await;
  assert_eq!(banks.data.unwrap().len(), 1);
}
