// gok_checkout/src/pipelines/contexts.rs

//! Data structs the checkout pipeline runs over.
//! Handlers receive them wrapped in `gok_flow::ContextData`.

use crate::models::{CouponUsage, CustomerInfo, Order, Payment, PaymentMethod, PaymentStatus};
use crate::services::coupon_engine::CouponQuote;
use crate::services::order_assembler::OrderLine;
use crate::state::AppState;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What the caller submits to check out a cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
  pub customer: CustomerInfo,
  pub items: Vec<OrderLine>,
  pub payment_method: PaymentMethod,
  #[serde(default)]
  pub coupon_code: Option<String>,
  #[serde(default)]
  pub bank_code: Option<String>,
  #[serde(default)]
  pub session_id: Option<String>,
}

/// Underlying data for the checkout pipeline (TData).
#[derive(Clone)]
pub struct CheckoutCtxData {
  pub app_state: AppState,
  pub request: CheckoutRequest,
  /// Read-only coupon pricing from `quote_coupon`. Placement re-prices the coupon
  /// and warns when the discount moved.
  pub coupon_quote: Option<CouponQuote>,
  pub order: Option<Order>,
  pub coupon_usage: Option<CouponUsage>,
  pub payment: Option<Payment>,
  pub summary: Option<CheckoutSummary>,
}

impl CheckoutCtxData {
  pub fn new(app_state: AppState, request: CheckoutRequest) -> Self {
    Self {
      app_state,
      request,
      coupon_quote: None,
      order: None,
      coupon_usage: None,
      payment: None,
      summary: None,
    }
  }

  pub fn coupon_code(&self) -> Option<&str> {
    self.request.coupon_code.as_deref().map(str::trim).filter(|code| !code.is_empty())
  }
}

/// What a completed checkout hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSummary {
  pub order_id: Uuid,
  pub order_number: String,
  pub sub_total: Decimal,
  pub tax: Decimal,
  pub shipping_fee: Decimal,
  pub discount_amount: Decimal,
  pub total_amount: Decimal,
  pub coupon_code: Option<String>,
  pub coupon_remaining_balance: Option<Decimal>,
  pub payment_id: Uuid,
  pub transaction_id: String,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub payment_description: String,
  pub qr_code_data: Option<String>,
  pub qr_code_image_url: Option<String>,
  pub expires_at: Option<DateTime<Utc>>,
}

impl CheckoutSummary {
  pub fn new(order: &Order, payment: &Payment, usage: Option<&CouponUsage>) -> Self {
    Self {
      order_id: order.id,
      order_number: order.order_number.clone(),
      sub_total: order.sub_total,
      tax: order.tax,
      shipping_fee: order.shipping_fee,
      discount_amount: order.discount_amount,
      total_amount: order.total_amount,
      coupon_code: order.coupon_code.clone(),
      coupon_remaining_balance: usage.and_then(|u| u.remaining_balance_after),
      payment_id: payment.id,
      transaction_id: payment.transaction_id.clone(),
      payment_method: payment.payment_method,
      payment_status: payment.status,
      payment_description: payment.payment_description.clone(),
      qr_code_data: payment.qr_code_data.clone(),
      qr_code_image_url: payment.qr_code_image_url.clone(),
      expires_at: payment.expires_at,
    }
  }
}
