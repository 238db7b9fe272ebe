// gok_checkout/src/models/payment.rs

use crate::errors::AppError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type as SqlxType};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Shared by `Payment::status` and `Order::payment_status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
pub enum PaymentStatus {
  Pending,
  Paid,
  Failed,
  Refunded,
}

impl fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let label = match self {
      PaymentStatus::Pending => "Pending",
      PaymentStatus::Paid => "Paid",
      PaymentStatus::Failed => "Failed",
      PaymentStatus::Refunded => "Refunded",
    };
    f.write_str(label)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, SqlxType)]
#[sqlx(type_name = "payment_method", rename_all = "snake_case")]
pub enum PaymentMethod {
  BankTransfer,
  CashOnDelivery,
}

impl FromStr for PaymentMethod {
  type Err = AppError;

  fn from_str(raw: &str) -> Result<Self, Self::Err> {
    let normalized: String = raw
      .chars()
      .filter(|c| c.is_ascii_alphanumeric())
      .map(|c| c.to_ascii_lowercase())
      .collect();
    match normalized.as_str() {
      "banktransfer" | "bank" | "qr" => Ok(PaymentMethod::BankTransfer),
      "cashondelivery" | "cod" | "cash" => Ok(PaymentMethod::CashOnDelivery),
      _ => Err(AppError::Validation(format!("Unknown payment method '{}'", raw))),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
  pub id: Uuid,
  pub order_id: Uuid,
  pub transaction_id: String,
  pub amount: Decimal,
  pub payment_method: PaymentMethod,
  pub status: PaymentStatus,
  pub qr_code_data: Option<String>,
  pub qr_code_image_url: Option<String>,
  pub bank_code: Option<String>,
  pub bank_name: Option<String>,
  pub account_number: Option<String>,
  pub account_name: Option<String>,
  pub payment_description: String,
  pub paid_at: Option<DateTime<Utc>>,
  pub expires_at: Option<DateTime<Utc>>,
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Payment {
  /// A pending payment whose window has closed. Detected on read, never by a timer.
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.status == PaymentStatus::Pending && self.expires_at.is_some_and(|deadline| now > deadline)
  }

  /// Counts against the one-active-payment-per-order rule.
  pub fn is_active(&self) -> bool {
    self.status != PaymentStatus::Failed
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;
  use rust_decimal_macros::dec;

  fn pending(expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Payment {
    Payment {
      id: Uuid::new_v4(),
      order_id: Uuid::new_v4(),
      transaction_id: "GC1-1".into(),
      amount: dec!(100),
      payment_method: PaymentMethod::BankTransfer,
      status: PaymentStatus::Pending,
      qr_code_data: None,
      qr_code_image_url: None,
      bank_code: None,
      bank_name: None,
      account_number: None,
      account_name: None,
      payment_description: "GOKCAFE GC1".into(),
      paid_at: None,
      expires_at,
      version: 0,
      created_at: now,
      updated_at: now,
    }
  }

  #[test]
  fn expiry_needs_a_deadline_in_the_past() {
    let now = Utc::now();
    assert!(!pending(Some(now + Duration::minutes(15)), now).is_expired(now));
    assert!(!pending(Some(now), now).is_expired(now), "deadline itself is still open");
    assert!(pending(Some(now - Duration::seconds(1)), now).is_expired(now));
    assert!(!pending(None, now).is_expired(now + Duration::days(30)));

    let mut paid = pending(Some(now - Duration::minutes(1)), now);
    paid.status = PaymentStatus::Paid;
    assert!(!paid.is_expired(now));
  }

  #[test]
  fn payment_method_aliases() {
    assert_eq!("bank_transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
    assert_eq!("BankTransfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
    assert_eq!("COD".parse::<PaymentMethod>().unwrap(), PaymentMethod::CashOnDelivery);
    assert!("paypal".parse::<PaymentMethod>().is_err());
  }
}
