// gok_checkout/src/models/coupon_usage.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only record of one successful coupon application.
///
/// `order_id` is empty when the coupon was applied outside a checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CouponUsage {
  pub id: Uuid,
  pub coupon_id: Uuid,
  pub order_id: Option<Uuid>,
  pub user_id: Option<Uuid>,
  pub session_id: Option<String>,
  pub original_amount: Decimal,
  pub discount_amount: Decimal,
  pub final_amount: Decimal,
  pub remaining_balance_after: Option<Decimal>,
  pub used_at: DateTime<Utc>,
}
