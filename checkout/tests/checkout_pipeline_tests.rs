// tests/checkout_pipeline_tests.rs
mod common;

use common::*;
use gok_checkout::errors::{AppError, ErrorKind};
use gok_checkout::models::{PaymentMethod, PaymentStatus};
use gok_checkout::pipelines::run_checkout;
use gok_checkout::seed::{GIFT_CARD_COUPON, WELCOME_COUPON};
use gok_checkout::services::OrderLine;
use gok_checkout::store::OrderQuery;
use rust_decimal_macros::dec;
use serial_test::serial;

#[tokio::test]
#[serial]
async fn checkout_with_coupon_places_order_and_opens_payment() {
  let app = TestApp::new().await;
  let request = app.checkout_request(PaymentMethod::BankTransfer, Some(" save10 "));

  let summary = run_checkout(&app.state, request).await.unwrap();

  assert_eq!(summary.sub_total, dec!(140000));
  assert_eq!(summary.tax, dec!(14000));
  assert_eq!(summary.shipping_fee, dec!(30000));
  assert_eq!(summary.discount_amount, dec!(18400));
  assert_eq!(summary.total_amount, dec!(165600));
  assert_eq!(summary.coupon_code.as_deref(), Some(WELCOME_COUPON));
  assert_eq!(summary.payment_status, PaymentStatus::Pending);
  assert!(summary.qr_code_data.as_deref().unwrap().contains("5406165600"));
  assert!(summary.expires_at.is_some());

  let order = app.state.orders.get_order(summary.order_id).await.unwrap();
  assert_eq!(order.total_amount, dec!(165600));
  let coupon = app.state.coupons.get_coupon_by_code(WELCOME_COUPON).await.unwrap();
  assert!(coupon.is_used);
  let usages = app.state.coupons.usage_history(coupon.id).await.unwrap();
  assert_eq!(usages.len(), 1);
  assert_eq!(usages[0].order_id, Some(order.id));
  assert_eq!(usages[0].original_amount, dec!(184000));
  assert_eq!(usages[0].session_id.as_deref(), Some("session-1"));

  let payment = app.state.payments.get_payment(summary.payment_id).await.unwrap();
  assert_eq!(payment.amount, dec!(165600));
  assert_eq!(payment.order_id, order.id);
}

#[tokio::test]
#[serial]
async fn checkout_without_coupon_skips_discount() {
  let app = TestApp::new().await;
  let request = app.checkout_request(PaymentMethod::CashOnDelivery, Some("   "));

  let summary = run_checkout(&app.state, request).await.unwrap();
  assert_eq!(summary.discount_amount, dec!(0));
  assert_eq!(summary.total_amount, dec!(184000));
  assert_eq!(summary.coupon_code, None);
  assert!(summary.qr_code_data.is_none());
}

#[tokio::test]
#[serial]
async fn gift_balance_can_cover_the_whole_order() {
  let app = TestApp::new().await;
  let request = app.checkout_request(PaymentMethod::BankTransfer, Some(GIFT_CARD_COUPON));

  let summary = run_checkout(&app.state, request).await.unwrap();
  assert_eq!(summary.discount_amount, dec!(184000));
  assert_eq!(summary.total_amount, dec!(0));
  assert_eq!(summary.coupon_remaining_balance, Some(dec!(16000)));
  assert!(summary.qr_code_data.as_deref().unwrap().contains("53037045802VN"));

  let coupon = app.state.coupons.get_coupon_by_code(GIFT_CARD_COUPON).await.unwrap();
  assert!(!coupon.is_used);
  assert_eq!(coupon.remaining_balance, Some(dec!(16000)));
}

#[tokio::test]
#[serial]
async fn rejected_coupon_aborts_before_any_write() {
  let app = TestApp::new().await;
  let mut request = app.checkout_request(PaymentMethod::BankTransfer, Some(WELCOME_COUPON));
  request.items = vec![OrderLine::new(app.iced_coffee(), 1)];

  let err = run_checkout(&app.state, request).await.unwrap_err();
  assert!(matches!(err, AppError::BusinessRule(ref msg) if msg.contains("at least 100000")));

  assert_eq!(app.product(app.iced_coffee()).await.stock_quantity, 100);
  let orders = app.state.orders.list_orders(&OrderQuery::default()).await.unwrap();
  assert_eq!(orders.total, 0);
  let coupon = app.state.coupons.get_coupon_by_code(WELCOME_COUPON).await.unwrap();
  assert_eq!(coupon.usage_count, 0);
}

#[tokio::test]
#[serial]
async fn invalid_requests_fail_validation() {
  let app = TestApp::new().await;

  let mut no_phone = app.checkout_request(PaymentMethod::CashOnDelivery, None);
  no_phone.customer.phone = String::new();
  let err = run_checkout(&app.state, no_phone).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::Invalid);

  let mut no_items = app.checkout_request(PaymentMethod::CashOnDelivery, None);
  no_items.items.clear();
  assert_eq!(run_checkout(&app.state, no_items).await.unwrap_err().kind(), ErrorKind::Invalid);

  let mut bad_bank = app.checkout_request(PaymentMethod::BankTransfer, None);
  bad_bank.bank_code = Some("NOTABANK".to_string());
  assert_eq!(run_checkout(&app.state, bad_bank).await.unwrap_err().kind(), ErrorKind::Invalid);

  let orders = app.state.orders.list_orders(&OrderQuery::default()).await.unwrap();
  assert_eq!(orders.total, 0);
}

#[tokio::test]
#[serial]
async fn payment_failure_leaves_order_pending() {
  let app = TestApp::new().await;
  let mut request = app.checkout_request(PaymentMethod::BankTransfer, None);
  // Known bank, but no receiving account configured for it.
  request.bank_code = Some("TCB".to_string());

  let err = run_checkout(&app.state, request).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::NotFound);

  let orders = app.state.orders.list_orders(&OrderQuery::default()).await.unwrap();
  assert_eq!(orders.total, 1);
  let order = &orders.items[0];
  assert_eq!(order.status, gok_checkout::models::OrderStatus::Pending);
  assert!(app.state.payments.payments_for_order(order.id).await.unwrap().is_empty());
  assert_eq!(app.product(app.iced_coffee()).await.stock_quantity, 98);
}

#[tokio::test]
#[serial]
async fn second_checkout_with_a_one_time_coupon_is_rejected() {
  let app = TestApp::new().await;
  run_checkout(&app.state, app.checkout_request(PaymentMethod::CashOnDelivery, Some(WELCOME_COUPON)))
    .await
    .unwrap();

  let err = run_checkout(&app.state, app.checkout_request(PaymentMethod::CashOnDelivery, Some(WELCOME_COUPON)))
    .await
    .unwrap_err();
  assert!(matches!(err, AppError::BusinessRule(ref msg) if msg.contains("already been used")));
  assert_eq!(app.product(app.iced_coffee()).await.stock_quantity, 98);
}

#[tokio::test]
#[serial]
async fn checkout_losing_the_last_units_places_nothing() {
  let app = TestApp::new().await;
  let espresso = app.add_product("Espresso", dec!(90000), 2).await;
  let mut request = app.checkout_request(PaymentMethod::BankTransfer, Some(WELCOME_COUPON));
  request.items = vec![OrderLine::new(espresso, 2)];
  app.rival_buys(espresso, 1);

  let err = run_checkout(&app.state, request).await.unwrap_err();
  assert_eq!(err.kind(), ErrorKind::BusinessRuleViolation);
  assert!(err.to_string().contains("Insufficient stock for 'Espresso': requested 2, available 1"));
  assert_eq!(app.rivals.pending(), 0);

  assert_eq!(app.product(espresso).await.stock_quantity, 1);
  let orders = app.state.orders.list_orders(&OrderQuery::default()).await.unwrap();
  assert_eq!(orders.total, 0);
  let coupon = app.state.coupons.get_coupon_by_code(WELCOME_COUPON).await.unwrap();
  assert_eq!(coupon.usage_count, 0);
  assert!(!coupon.is_used);
  assert!(app.state.coupons.usage_history(coupon.id).await.unwrap().is_empty());
}

#[tokio::test]
#[serial]
async fn checkout_retries_when_stock_moves_underneath_it() {
  let app = TestApp::new().await;
  let espresso = app.add_product("Espresso", dec!(90000), 5).await;
  let mut request = app.checkout_request(PaymentMethod::BankTransfer, Some(WELCOME_COUPON));
  request.items = vec![OrderLine::new(espresso, 2)];
  app.rival_buys(espresso, 1);

  let summary = run_checkout(&app.state, request).await.unwrap();
  assert_eq!(app.rivals.pending(), 0);
  assert_eq!(summary.sub_total, dec!(180000));
  assert_eq!(summary.discount_amount, dec!(22800));
  assert_eq!(summary.total_amount, dec!(205200));

  assert_eq!(app.product(espresso).await.stock_quantity, 2);
  let orders = app.state.orders.list_orders(&OrderQuery::default()).await.unwrap();
  assert_eq!(orders.total, 1);
  let coupon = app.state.coupons.get_coupon_by_code(WELCOME_COUPON).await.unwrap();
  assert_eq!(coupon.usage_count, 1);
  assert_eq!(app.state.coupons.usage_history(coupon.id).await.unwrap().len(), 1);
}

#[tokio::test]
#[serial]
async fn checkout_reprices_a_gift_balance_spent_after_the_quote() {
  let app = TestApp::new().await;
  let request = app.checkout_request(PaymentMethod::BankTransfer, Some(GIFT_CARD_COUPON));
  app.rival_redeems(GIFT_CARD_COUPON, dec!(150000));

  let summary = run_checkout(&app.state, request).await.unwrap();
  // Quoted 184000, but only 50000 was left by the time the order was placed.
  assert_eq!(summary.discount_amount, dec!(50000));
  assert_eq!(summary.total_amount, dec!(134000));
  assert_eq!(summary.coupon_remaining_balance, Some(dec!(0)));

  let payment = app.state.payments.get_payment(summary.payment_id).await.unwrap();
  assert_eq!(payment.amount, dec!(134000));
  let coupon = app.state.coupons.get_coupon_by_code(GIFT_CARD_COUPON).await.unwrap();
  assert!(coupon.is_used);
  assert_eq!(coupon.usage_count, 2);
  let usages = app.state.coupons.usage_history(coupon.id).await.unwrap();
  assert_eq!(usages.len(), 1);
  assert_eq!(usages[0].order_id, Some(summary.order_id));
}
