// gok_checkout/src/models/order.rs

use super::order_item::OrderItem;
use super::payment::{PaymentMethod, PaymentStatus};
use crate::errors::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
pub enum OrderStatus {
  Pending,
  Confirmed,
  Processing,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 6] = [
    OrderStatus::Pending,
    OrderStatus::Confirmed,
    OrderStatus::Processing,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
  ];

  pub fn is_terminal(self) -> bool {
    matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
  }

  /// Position on the fulfilment chain; `Cancelled` is off the chain.
  fn rank(self) -> Option<u8> {
    match self {
      OrderStatus::Pending => Some(0),
      OrderStatus::Confirmed => Some(1),
      OrderStatus::Processing => Some(2),
      OrderStatus::Shipped => Some(3),
      OrderStatus::Delivered => Some(4),
      OrderStatus::Cancelled => None,
    }
  }

  /// Forward moves along Pending → Confirmed → Processing → Shipped → Delivered.
  /// Skipping ahead is allowed, going back is not.
  pub fn can_advance_to(self, next: OrderStatus) -> bool {
    match (self.rank(), next.rank()) {
      (Some(from), Some(to)) => !self.is_terminal() && to > from,
      _ => false,
    }
  }

  pub fn can_cancel(self) -> bool {
    !self.is_terminal()
  }

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Pending => "Pending",
      OrderStatus::Confirmed => "Confirmed",
      OrderStatus::Processing => "Processing",
      OrderStatus::Shipped => "Shipped",
      OrderStatus::Delivered => "Delivered",
      OrderStatus::Cancelled => "Cancelled",
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = AppError;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    let wanted = raw.trim();
    OrderStatus::ALL
      .into_iter()
      .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
      .ok_or_else(|| AppError::Validation(format!("Unknown order status '{}'", raw)))
  }
}

/// Contact and delivery details captured with the order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
  pub user_id: Option<Uuid>,
  pub name: String,
  pub email: Option<String>,
  pub phone: String,
  pub shipping_address: String,
  pub notes: Option<String>,
}

impl CustomerInfo {
  pub fn validate(&self) -> Result<(), AppError> {
    let mut problems = Vec::new();
    if self.name.trim().is_empty() {
      problems.push("customer name is required");
    }
    if self.phone.trim().is_empty() {
      problems.push("customer phone is required");
    }
    if self.shipping_address.trim().is_empty() {
      problems.push("shipping address is required");
    }
    if let Some(email) = &self.email {
      if !email.trim().is_empty() && !email.contains('@') {
        problems.push("customer email is malformed");
      }
    }
    if problems.is_empty() {
      Ok(())
    } else {
      Err(AppError::Validation(problems.join("; ")))
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: Option<Uuid>,
  pub customer_name: String,
  pub customer_email: Option<String>,
  pub customer_phone: String,
  pub shipping_address: String,
  pub notes: Option<String>,
  pub sub_total: Decimal,
  pub tax: Decimal,
  pub shipping_fee: Decimal,
  pub discount_amount: Decimal,
  pub total_amount: Decimal,
  pub coupon_code: Option<String>,
  pub status: OrderStatus,
  pub payment_method: PaymentMethod,
  pub payment_status: PaymentStatus,
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[sqlx(skip)]
  pub items: Vec<OrderItem>,
}

impl Order {
  /// Total before any coupon discount.
  pub fn gross_total(&self) -> Decimal {
    self.sub_total + self.tax + self.shipping_fee
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn status_parsing_ignores_case() {
    assert_eq!("shipped".parse::<OrderStatus>().unwrap(), OrderStatus::Shipped);
    assert_eq!(" CONFIRMED ".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
    assert!(matches!("lost".parse::<OrderStatus>(), Err(AppError::Validation(_))));
  }

  #[test]
  fn chain_only_moves_forward() {
    use OrderStatus::*;
    assert!(Pending.can_advance_to(Confirmed));
    assert!(Pending.can_advance_to(Shipped));
    assert!(Shipped.can_advance_to(Delivered));
    assert!(!Processing.can_advance_to(Confirmed));
    assert!(!Confirmed.can_advance_to(Confirmed));
    assert!(!Delivered.can_advance_to(Delivered));
    assert!(!Pending.can_advance_to(Cancelled));
    assert!(!Cancelled.can_advance_to(Delivered));
  }

  #[test]
  fn cancellation_is_open_until_terminal() {
    use OrderStatus::*;
    for status in [Pending, Confirmed, Processing, Shipped] {
      assert!(status.can_cancel(), "{} should be cancellable", status);
    }
    assert!(!Delivered.can_cancel());
    assert!(!Cancelled.can_cancel());
  }

  #[test]
  fn customer_validation_lists_every_problem() {
    let info = CustomerInfo {
      email: Some("nobody".into()),
      ..Default::default()
    };
    let err = info.validate().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("name"));
    assert!(message.contains("phone"));
    assert!(message.contains("shipping address"));
    assert!(message.contains("email"));
  }
}
