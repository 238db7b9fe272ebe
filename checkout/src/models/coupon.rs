// gok_checkout/src/models/coupon.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "coupon_type", rename_all = "snake_case")]
pub enum CouponType {
  /// Usable in exactly one successful application.
  OneTime,
  /// Carries a balance that each application draws down until it is exhausted.
  Gradual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "discount_type", rename_all = "snake_case")]
pub enum DiscountType {
  Percentage,
  FixedAmount,
}

/// Lifecycle view derived from the stored flags and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CouponStatus {
  Active,
  Inactive,
  NotStarted,
  Expired,
  Used,
  Exhausted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Coupon {
  pub id: Uuid,
  pub code: String,
  pub name: String,
  pub description: Option<String>,
  pub coupon_type: CouponType,
  pub discount_type: DiscountType,
  pub discount_value: Decimal,
  pub max_discount_amount: Option<Decimal>,
  pub min_order_amount: Option<Decimal>,
  pub initial_balance: Option<Decimal>,
  pub remaining_balance: Option<Decimal>,
  pub is_system_coupon: bool,
  pub user_id: Option<Uuid>,
  pub is_active: bool,
  pub start_date: DateTime<Utc>,
  pub end_date: DateTime<Utc>,
  pub max_usage_count: Option<i32>,
  pub usage_count: i32,
  pub is_used: bool,
  pub image_url: Option<String>,
  pub is_deleted: bool,
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Coupon {
  pub fn usage_limit_reached(&self) -> bool {
    self.max_usage_count.is_some_and(|max| self.usage_count >= max)
  }

  pub fn status(&self, now: DateTime<Utc>) -> CouponStatus {
    if !self.is_active {
      CouponStatus::Inactive
    } else if now < self.start_date {
      CouponStatus::NotStarted
    } else if now > self.end_date {
      CouponStatus::Expired
    } else if self.is_used {
      CouponStatus::Used
    } else if self.usage_limit_reached() {
      CouponStatus::Exhausted
    } else {
      CouponStatus::Active
    }
  }
}

/// Input for creating a coupon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCoupon {
  pub code: String,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  pub coupon_type: CouponType,
  pub discount_type: DiscountType,
  pub discount_value: Decimal,
  #[serde(default)]
  pub max_discount_amount: Option<Decimal>,
  #[serde(default)]
  pub min_order_amount: Option<Decimal>,
  /// Required for `Gradual`, rejected for `OneTime`.
  #[serde(default)]
  pub initial_balance: Option<Decimal>,
  #[serde(default)]
  pub is_system_coupon: bool,
  #[serde(default)]
  pub user_id: Option<Uuid>,
  pub start_date: DateTime<Utc>,
  pub end_date: DateTime<Utc>,
  #[serde(default)]
  pub max_usage_count: Option<i32>,
  #[serde(default)]
  pub image_url: Option<String>,
}
