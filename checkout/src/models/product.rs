// gok_checkout/src/models/product.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Catalog entry. `stock_quantity` is the inventory ledger for the product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: Uuid,
  pub name: String,
  pub description: Option<String>,
  pub price: Decimal,
  pub discount_price: Option<Decimal>,
  pub stock_quantity: i32,
  pub is_active: bool,
  pub is_deleted: bool,
  pub version: i64,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Product {
  pub fn new(name: impl Into<String>, price: Decimal, stock_quantity: i32, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4(),
      name: name.into(),
      description: None,
      price,
      discount_price: None,
      stock_quantity,
      is_active: true,
      is_deleted: false,
      version: 0,
      created_at: now,
      updated_at: now,
    }
  }

  /// Price charged at order time.
  pub fn selling_price(&self) -> Decimal {
    self.discount_price.unwrap_or(self.price)
  }

  pub fn is_purchasable(&self) -> bool {
    self.is_active && !self.is_deleted
  }
}
